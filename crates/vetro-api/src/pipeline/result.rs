//! Per-feature outcomes and the aggregated run report.

use serde::Serialize;
use serde_json::Value;

use crate::error::SubmitError;
use crate::request::PatchRequest;

/// Final status of one feature in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The service accepted the update.
    Succeeded,
    /// The update failed and will not be retried automatically.
    Failed,
    /// Not attempted because the run stopped first.
    Skipped,
}

/// Result of submitting one feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub feature_id: String,
    pub status: OutcomeStatus,
    /// Error detail, set only for failed outcomes.
    pub error: Option<SubmitError>,
    /// Requests sent for this feature (0 when skipped).
    pub attempts: u32,
    /// Whether any attempt was answered with HTTP 429.
    pub rate_limited: bool,
}

impl UpdateOutcome {
    #[must_use]
    pub fn succeeded(feature_id: &str, attempts: u32) -> Self {
        Self {
            feature_id: feature_id.to_owned(),
            status: OutcomeStatus::Succeeded,
            error: None,
            attempts,
            rate_limited: false,
        }
    }

    #[must_use]
    pub fn failed(feature_id: &str, error: SubmitError, attempts: u32) -> Self {
        Self {
            feature_id: feature_id.to_owned(),
            status: OutcomeStatus::Failed,
            error: Some(error),
            attempts,
            rate_limited: false,
        }
    }

    #[must_use]
    pub fn skipped(feature_id: &str) -> Self {
        Self {
            feature_id: feature_id.to_owned(),
            status: OutcomeStatus::Skipped,
            error: None,
            attempts: 0,
            rate_limited: false,
        }
    }

    #[must_use]
    pub fn with_rate_limited(mut self, rate_limited: bool) -> Self {
        self.rate_limited = rate_limited;
        self
    }
}

/// Why a run stopped before reaching every feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// The API key was rejected.
    Authentication { message: String },
    /// The caller cancelled the run.
    Cancelled,
}

/// Aggregated result of a pipeline run.
///
/// `outcomes` holds exactly one entry per feature of the submitted change
/// set, in change-set order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub outcomes: Vec<UpdateOutcome>,
    /// Set when the run stopped early.
    pub aborted: Option<AbortReason>,
    /// Set when a feature exhausted its retries on HTTP 429.
    pub rate_limited: bool,
}

impl UpdateReport {
    /// Append an outcome and update the counters.
    pub fn record(&mut self, outcome: UpdateOutcome) {
        match outcome.status {
            OutcomeStatus::Succeeded => self.succeeded += 1,
            OutcomeStatus::Failed => self.failed += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
        }
        if outcome.status == OutcomeStatus::Failed
            && outcome.error.as_ref().is_some_and(SubmitError::is_rate_limited)
        {
            self.rate_limited = true;
        }
        self.outcomes.push(outcome);
    }

    /// Total number of features in the run.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether every feature succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.failed == 0 && self.skipped == 0
    }

    /// Outcomes that failed, in run order.
    pub fn failures(&self) -> impl Iterator<Item = &UpdateOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
    }
}

/// Progress notification sent after each feature resolves.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// Features resolved so far, including this one.
    pub completed: usize,
    pub total: usize,
    pub outcome: &'a UpdateOutcome,
}

/// A request that would be sent, shown without sending it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestPreview {
    pub feature_id: String,
    pub method: &'static str,
    pub url: String,
    pub body: Value,
}

impl From<PatchRequest> for RequestPreview {
    fn from(request: PatchRequest) -> Self {
        Self {
            feature_id: request.feature_id,
            method: "PATCH",
            url: request.url,
            body: request.body,
        }
    }
}

/// Previews produced by a dry run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DryRunResult {
    /// Requests for the first features, in change-set order.
    pub previews: Vec<RequestPreview>,
    /// Features in the whole change set.
    pub total_features: usize,
    /// Field changes in the whole change set.
    pub total_fields: usize,
}

impl DryRunResult {
    /// Features not covered by a preview.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total_features.saturating_sub(self.previews.len())
    }
}
