//! CSV export loading.

use std::path::{Path, PathBuf};

use vetro_diff::{FeatureRecord, FeatureType, ID_COLUMN};

/// Error reading a CSV export.
#[derive(Debug, thiserror::Error)]
pub(crate) enum InputError {
    #[error("failed to read {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{} has no '{ID_COLUMN}' column", .0.display())]
    MissingIdColumn(PathBuf),

    #[error("cannot tell the feature type of {} (use --feature-type)", .0.display())]
    UnknownFeatureType(PathBuf),
}

/// Resolve the feature type from the flag or the file name.
pub(crate) fn resolve_feature_type(
    explicit: Option<FeatureType>,
    path: &Path,
) -> Result<FeatureType, InputError> {
    if let Some(feature_type) = explicit {
        return Ok(feature_type);
    }
    path.file_name()
        .and_then(|name| FeatureType::detect(&name.to_string_lossy()))
        .ok_or_else(|| InputError::UnknownFeatureType(path.to_path_buf()))
}

/// Read every row of a CSV export as a feature record.
///
/// The header row names the fields; the `vetro_id` column is the feature
/// id. Empty cells become `null`.
pub(crate) fn load_records(
    path: &Path,
    feature_type: FeatureType,
) -> Result<Vec<FeatureRecord>, InputError> {
    let csv_error = |source| InputError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    let headers = reader.headers().map_err(csv_error)?.clone();
    let id_index = headers
        .iter()
        .position(|h| h.trim() == ID_COLUMN)
        .ok_or_else(|| InputError::MissingIdColumn(path.to_path_buf()))?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_error)?;
        let id = row.get(id_index).unwrap_or_default().trim();
        let mut record = FeatureRecord::new(id, feature_type);
        for (index, (header, cell)) in headers.iter().zip(row.iter()).enumerate() {
            if index != id_index {
                record.set(header.trim(), Some(cell.to_owned()));
            }
        }
        records.push(record);
    }

    tracing::info!("Read {} row(s) from {}", records.len(), path.display());
    Ok(records)
}
