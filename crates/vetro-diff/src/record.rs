//! Feature rows.

use std::collections::BTreeMap;

use crate::schema::FeatureType;

/// Column holding the Vetro feature identifier.
pub const ID_COLUMN: &str = "vetro_id";

/// Prefix Vetro uses for read-only system columns in exports.
const SYSTEM_PREFIX: &str = "v_";

/// Whether `column` is a read-only system column (`vetro_id`, `v_*`).
#[must_use]
pub fn is_system_column(column: &str) -> bool {
    column == ID_COLUMN || column.starts_with(SYSTEM_PREFIX)
}

/// One feature row as loaded from an export or fetched from the API.
///
/// Field values are raw cell text; `None` is an empty cell. Empty strings
/// are normalized to `None` on insertion so that "" and a missing value
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRecord {
    /// Opaque Vetro identifier.
    pub id: String,
    /// Kind of feature.
    pub feature_type: FeatureType,
    /// Column name to raw cell value.
    pub fields: BTreeMap<String, Option<String>>,
}

/// A row after in-grid editing. Same shape as the baseline row.
pub type EditedRecord = FeatureRecord;

impl FeatureRecord {
    /// Create a row with no fields.
    #[must_use]
    pub fn new(id: impl Into<String>, feature_type: FeatureType) -> Self {
        Self {
            id: id.into(),
            feature_type,
            fields: BTreeMap::new(),
        }
    }

    /// Add a populated cell.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, Some(value.into()));
        self
    }

    /// Add an empty cell.
    #[must_use]
    pub fn with_empty(mut self, name: impl Into<String>) -> Self {
        self.set(name, None);
        self
    }

    /// Set a cell, normalizing empty text to `None`.
    pub fn set(&mut self, name: impl Into<String>, value: Option<String>) {
        let value = value.filter(|v| !v.is_empty());
        self.fields.insert(name.into(), value);
    }

    /// Whether the row has a column named `name` (empty or not).
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Raw value of a column. Outer `None` means the column is absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.fields.get(name).map(Option::as_deref)
    }
}
