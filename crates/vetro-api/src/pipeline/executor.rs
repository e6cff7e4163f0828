//! Sequential submission of a change set.

use std::time::Instant;

use tracing::{debug, info, warn};
use vetro_diff::ChangeSet;

use super::cancel::CancelFlag;
use super::result::{
    AbortReason, DryRunResult, OutcomeStatus, Progress, RequestPreview, UpdateOutcome,
    UpdateReport,
};
use crate::client::VetroClient;
use crate::error::PipelineError;

/// Drives a [`ChangeSet`] through a [`VetroClient`], one feature at a time.
pub struct UpdatePipeline<'a> {
    client: &'a VetroClient,
}

impl<'a> UpdatePipeline<'a> {
    #[must_use]
    pub fn new(client: &'a VetroClient) -> Self {
        Self { client }
    }

    /// Submit every feature of `change_set` in order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingApiKey`] when `api_key` is blank.
    /// Per-feature failures are reported in the [`UpdateReport`].
    pub fn run(
        &self,
        change_set: &ChangeSet,
        api_key: &str,
    ) -> Result<UpdateReport, PipelineError> {
        self.run_with_progress(change_set, api_key, &CancelFlag::new(), |_| {})
    }

    /// Submit every feature of `change_set`, reporting progress as each
    /// feature resolves.
    ///
    /// Features are processed strictly in change-set order. A rejected API
    /// key fails the current feature and skips the rest. Cancellation is
    /// observed between features; features not yet started are skipped and
    /// earlier outcomes are kept.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingApiKey`] when `api_key` is blank.
    pub fn run_with_progress(
        &self,
        change_set: &ChangeSet,
        api_key: &str,
        cancel: &CancelFlag,
        mut on_progress: impl FnMut(Progress<'_>),
    ) -> Result<UpdateReport, PipelineError> {
        if api_key.trim().is_empty() {
            return Err(PipelineError::MissingApiKey);
        }

        let start = Instant::now();
        let total = change_set.feature_count();
        let throttle = self.client.throttle_delay();
        let mut report = UpdateReport::default();

        info!(
            "Submitting {} field change(s) across {} feature(s)",
            change_set.field_count(),
            total
        );

        for (index, feature) in change_set.iter().enumerate() {
            if report.aborted.is_none() && cancel.is_cancelled() {
                warn!("Run cancelled after {index} of {total} feature(s)");
                report.aborted = Some(AbortReason::Cancelled);
            }

            let outcome = if report.aborted.is_some() {
                UpdateOutcome::skipped(&feature.feature_id)
            } else {
                self.client.submit_change(feature, api_key)
            };

            if let Some(error) = outcome.error.as_ref().filter(|e| e.is_fatal_for_run()) {
                warn!("API key rejected, skipping remaining features");
                report.aborted = Some(AbortReason::Authentication {
                    message: error.to_string(),
                });
            }

            let succeeded = outcome.status == OutcomeStatus::Succeeded;
            report.record(outcome);
            if let Some(outcome) = report.outcomes.last() {
                on_progress(Progress {
                    completed: index + 1,
                    total,
                    outcome,
                });
            }

            if succeeded && index + 1 < total && !throttle.is_zero() {
                debug!("Throttling for {}ms", throttle.as_millis());
                std::thread::sleep(throttle);
            }
        }

        info!(
            "Run finished in {:.2}s: {} succeeded, {} failed, {} skipped",
            start.elapsed().as_secs_f64(),
            report.succeeded,
            report.failed,
            report.skipped
        );

        Ok(report)
    }

    /// Build the requests for the first `limit` features without sending them.
    #[must_use]
    pub fn dry_run(&self, change_set: &ChangeSet, limit: usize) -> DryRunResult {
        let previews = change_set
            .iter()
            .take(limit)
            .map(|feature| RequestPreview::from(self.client.request_for(feature)))
            .collect();
        DryRunResult {
            previews,
            total_features: change_set.feature_count(),
            total_fields: change_set.field_count(),
        }
    }
}
