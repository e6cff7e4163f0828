//! Error types for schema validation and diffing.

use serde::Serialize;

use crate::schema::{FeatureType, FieldType};

/// Rejection of a single field value by the schema.
///
/// Both variants are recoverable: the offending change is left out of the
/// change set and shown to the user for correction.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaError {
    /// Field is not editable for this feature type.
    #[error("{feature_type} has no editable field '{field}'")]
    UnknownField {
        /// Feature type the field was looked up on.
        feature_type: FeatureType,
        /// Field name as it appeared in the row.
        field: String,
    },

    /// Value cannot be read as the field's declared type.
    #[error("{feature_type}.{field}: '{value}' is not a valid {expected}")]
    InvalidType {
        /// Feature type the field belongs to.
        feature_type: FeatureType,
        /// Field name.
        field: String,
        /// Declared type of the field.
        expected: FieldType,
        /// Raw value that failed to parse.
        value: String,
    },
}

/// Which snapshot a malformed row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Snapshot {
    /// Rows as originally loaded.
    Baseline,
    /// Rows after editing.
    Edited,
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Baseline => f.write_str("baseline"),
            Self::Edited => f.write_str("edited"),
        }
    }
}

/// Input that cannot be diffed at all.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The same feature id appears twice in one snapshot.
    #[error("duplicate feature id '{id}' in {snapshot} rows")]
    DuplicateFeature {
        /// Repeated feature id.
        id: String,
        /// Snapshot containing the duplicate.
        snapshot: Snapshot,
    },

    /// A row changed feature type between baseline and edited snapshots.
    #[error("feature '{id}' is a {baseline} in the baseline but a {edited} in the edited rows")]
    FeatureTypeMismatch {
        /// Feature id.
        id: String,
        /// Type recorded in the baseline.
        baseline: FeatureType,
        /// Type recorded in the edited rows.
        edited: FeatureType,
    },
}
