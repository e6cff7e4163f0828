//! `vetro diff` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use vetro_diff::{Diff, FeatureType, ID_COLUMN, compute_changes};

use crate::error::CliError;
use crate::input::{load_records, resolve_feature_type};
use crate::output::Output;

/// Arguments for the diff command.
#[derive(Args)]
pub(crate) struct DiffArgs {
    /// CSV export as originally downloaded.
    baseline: PathBuf,

    /// CSV export after editing.
    edited: PathBuf,

    /// Feature type of both files (default: detect from the edited file name).
    #[arg(short = 't', long)]
    feature_type: Option<FeatureType>,
}

impl DiffArgs {
    /// Execute the diff command.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be read or the rows are malformed.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let diff = load_diff(&self.baseline, &self.edited, self.feature_type)?;
        print_diff(&output, &diff);
        Ok(())
    }
}

/// Read both exports and compare them.
pub(crate) fn load_diff(
    baseline: &Path,
    edited: &Path,
    feature_type: Option<FeatureType>,
) -> Result<Diff, CliError> {
    let feature_type = resolve_feature_type(feature_type, edited)?;
    let baseline = load_records(baseline, feature_type)?;
    let edited = load_records(edited, feature_type)?;
    Ok(compute_changes(&baseline, &edited)?)
}

pub(crate) fn print_diff(output: &Output, diff: &Diff) {
    let change_set = &diff.change_set;
    if change_set.is_empty() {
        output.success("No changes detected.");
    } else {
        output.highlight(&format!(
            "{} field change(s) across {} feature(s):",
            change_set.field_count(),
            change_set.feature_count()
        ));
        for feature in change_set {
            output.info(&format!("\n  {} ({})", feature.feature_id, feature.feature_type));
            for change in &feature.changes {
                output.info(&format!(
                    "    {}: {} -> {}",
                    change.field,
                    display_value(change.old.as_deref()),
                    display_value(change.new.as_deref())
                ));
            }
        }
    }

    if !diff.invalid.is_empty() {
        output.warning(&format!(
            "\n{} edit(s) rejected and will not be submitted:",
            diff.invalid.len()
        ));
        for invalid in &diff.invalid {
            output.info(&format!("  - {}: {}", invalid.change.feature_id, invalid.reason));
        }
    }

    if !diff.unknown_features.is_empty() {
        output.warning(&format!(
            "\n{} feature(s) not in the baseline:",
            diff.unknown_features.len()
        ));
        for id in &diff.unknown_features {
            output.info(&format!("  - {id}"));
        }
    }

    if !diff.skipped_rows.is_empty() {
        // Rows are reported one-based, counting from the first data row.
        let rows: Vec<_> = diff.skipped_rows.iter().map(|r| (r + 1).to_string()).collect();
        output.warning(&format!(
            "\n{} edited row(s) without a {ID_COLUMN} skipped: {}",
            rows.len(),
            rows.join(", ")
        ));
    }
}

fn display_value(value: Option<&str>) -> String {
    value.map_or_else(|| "(empty)".to_owned(), |v| format!("\"{v}\""))
}
