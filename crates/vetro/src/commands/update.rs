//! `vetro update` command implementation.

use std::path::PathBuf;

use clap::Args;
use vetro_api::{
    AbortReason, CancelFlag, DryRunResult, OutcomeStatus, PipelineError, Progress, UpdatePipeline,
    UpdateReport, VetroClient,
};
use vetro_config::{CliSettings, Config};
use vetro_diff::FeatureType;
use vetro_session::{FileBlobStore, SharedState};

use super::diff::{load_diff, print_diff};
use crate::error::CliError;
use crate::output::Output;

/// Requests shown by `--dry-run`.
const DRY_RUN_PREVIEW_LIMIT: usize = 5;

/// Arguments for the update command.
#[derive(Args)]
pub(crate) struct UpdateArgs {
    /// CSV export as originally downloaded.
    baseline: PathBuf,

    /// CSV export after editing.
    edited: PathBuf,

    /// Feature type of both files (default: detect from the edited file name).
    #[arg(short = 't', long)]
    feature_type: Option<FeatureType>,

    /// Show the requests without sending them.
    #[arg(long)]
    dry_run: bool,

    /// Submit without asking for confirmation.
    #[arg(short, long)]
    yes: bool,

    /// API key for this run (overrides the saved and configured keys).
    #[arg(long)]
    api_key: Option<String>,

    /// Vetro API base URL (overrides config).
    #[arg(long)]
    base_url: Option<String>,

    /// Maximum attempts per feature (overrides config).
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Session store directory (overrides config).
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover vetro.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl UpdateArgs {
    /// Execute the update command.
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs cannot be read, no API key is
    /// available, or any feature was not updated.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            base_url: self.base_url.clone(),
            max_attempts: self.max_attempts,
            store_dir: self.store_dir.clone(),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let diff = load_diff(&self.baseline, &self.edited, self.feature_type)?;
        print_diff(&output, &diff);
        if diff.change_set.is_empty() {
            return Ok(());
        }

        let client = VetroClient::from_config(&config.api, &config.retry);
        let pipeline = UpdatePipeline::new(&client);

        if self.dry_run {
            print_dry_run(&output, &pipeline.dry_run(&diff.change_set, DRY_RUN_PREVIEW_LIMIT));
            return Ok(());
        }

        let api_key = self.resolve_api_key(&config)?;

        if !self.yes {
            let question = format!(
                "\nSubmit {} feature(s) to {}?",
                diff.change_set.feature_count(),
                config.api.base_url
            );
            if !output.confirm(&question)? {
                output.warning("Aborted, nothing was submitted.");
                return Ok(());
            }
        }

        output.separator();
        let report = pipeline.run_with_progress(
            &diff.change_set,
            &api_key,
            &CancelFlag::new(),
            |progress| print_progress(&output, &progress),
        )?;
        output.separator();
        print_report(&output, &report);

        if report.is_success() {
            Ok(())
        } else {
            Err(CliError::Incomplete {
                failed: report.failed,
                skipped: report.skipped,
            })
        }
    }

    /// Run key: `--api-key`, else the session's effective key.
    fn resolve_api_key(&self, config: &Config) -> Result<String, CliError> {
        if let Some(key) = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(key.to_owned());
        }
        let session = SharedState::new(FileBlobStore::new(&config.session_resolved.store_dir));
        session
            .load()
            .effective_api_key(config.backend_api_key().as_deref())
            .ok_or(CliError::Pipeline(PipelineError::MissingApiKey))
    }
}

fn print_dry_run(output: &Output, result: &DryRunResult) {
    output.highlight("\n[DRY RUN] No changes made.");
    for preview in &result.previews {
        output.info(&format!("\n{} {}", preview.method, preview.url));
        let body = serde_json::to_string_pretty(&preview.body).unwrap_or_default();
        output.detail(&body);
    }
    if result.remaining() > 0 {
        output.info(&format!("\n... and {} more feature(s)", result.remaining()));
    }
}

fn print_progress(output: &Output, progress: &Progress<'_>) {
    let outcome = progress.outcome;
    let prefix = format!("[{}/{}] {}", progress.completed, progress.total, outcome.feature_id);
    match outcome.status {
        OutcomeStatus::Succeeded if outcome.attempts > 1 => {
            output.success(&format!("{prefix}: updated after {} attempts", outcome.attempts));
        }
        OutcomeStatus::Succeeded => output.success(&format!("{prefix}: updated")),
        OutcomeStatus::Failed => {
            let reason = outcome
                .error
                .as_ref()
                .map_or_else(String::new, ToString::to_string);
            output.error(&format!("{prefix}: failed ({reason})"));
        }
        OutcomeStatus::Skipped => output.detail(&format!("{prefix}: skipped")),
    }
}

fn print_report(output: &Output, report: &UpdateReport) {
    match &report.aborted {
        Some(AbortReason::Authentication { message }) => {
            output.error(&format!("Run stopped: {message}"));
            output.info("Check the API key with `vetro settings show`.");
        }
        Some(AbortReason::Cancelled) => output.warning("Run cancelled."),
        None => {}
    }

    let summary = format!(
        "{} succeeded, {} failed, {} skipped",
        report.succeeded, report.failed, report.skipped
    );
    if report.is_success() {
        output.success(&summary);
    } else {
        output.warning(&summary);
    }

    if report.rate_limited {
        output.warning(
            "The API rate limit was hit. Wait a while, then rerun to retry the failed features.",
        );
    }
}
