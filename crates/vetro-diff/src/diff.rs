//! Change detection between a baseline and an edited snapshot.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::error::{DiffError, SchemaError, Snapshot};
use crate::record::{EditedRecord, FeatureRecord, is_system_column};
use crate::schema::{FeatureType, fields_for, validate};
use crate::value::TypedValue;

/// One changed field of one feature.
///
/// `old` and `new` are raw cell text (`None` for an empty cell). They never
/// compare equal under the field's declared type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    /// Feature the field belongs to.
    pub feature_id: String,
    /// Field name.
    pub field: String,
    /// Baseline value.
    pub old: Option<String>,
    /// Edited value, submitted literally.
    pub new: Option<String>,
}

/// All changed fields of a single feature, in schema order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureChanges {
    /// Feature id.
    pub feature_id: String,
    /// Feature type of the row.
    pub feature_type: FeatureType,
    /// Changed fields. Never empty.
    pub changes: Vec<FieldChange>,
}

impl FeatureChanges {
    /// Changed fields and their new values, in order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.changes
            .iter()
            .map(|c| (c.field.as_str(), c.new.as_deref()))
    }
}

/// Validated, submittable changes grouped by feature.
///
/// Features appear in the order they first appear in the edited snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet {
    features: Vec<FeatureChanges>,
}

impl ChangeSet {
    /// Build a change set from already grouped changes, dropping empty groups.
    #[must_use]
    pub fn from_features(features: Vec<FeatureChanges>) -> Self {
        Self {
            features: features
                .into_iter()
                .filter(|f| !f.changes.is_empty())
                .collect(),
        }
    }

    /// Whether there is nothing to submit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of features with changes.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Total number of changed fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.features.iter().map(|f| f.changes.len()).sum()
    }

    /// Iterate features in submission order.
    pub fn iter(&self) -> std::slice::Iter<'_, FeatureChanges> {
        self.features.iter()
    }

    /// Flat list of field changes, in submission order.
    pub fn field_changes(&self) -> impl Iterator<Item = &FieldChange> {
        self.features.iter().flat_map(|f| f.changes.iter())
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a FeatureChanges;
    type IntoIter = std::slice::Iter<'a, FeatureChanges>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An edit that was detected but rejected by the schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidChange {
    /// The rejected edit.
    pub change: FieldChange,
    /// Why it was rejected.
    pub reason: SchemaError,
}

/// Result of comparing two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diff {
    /// Changes safe to submit.
    pub change_set: ChangeSet,
    /// Edits rejected by the schema, for the user to correct.
    pub invalid: Vec<InvalidChange>,
    /// Edited feature ids with no baseline row.
    pub unknown_features: Vec<String>,
    /// Zero-based positions of edited rows with a blank id.
    pub skipped_rows: Vec<usize>,
}

impl Diff {
    /// Whether every edit was accepted and every feature was known.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty() && self.unknown_features.is_empty()
    }
}

/// Compute the per-feature, per-field changes from `baseline` to `edited`.
///
/// For every edited row, each editable field present in both rows is
/// compared under its declared type. Differing values that validate become
/// [`FieldChange`]s; those that don't are reported in [`Diff::invalid`].
/// Edits to columns outside the schema are reported as
/// [`SchemaError::UnknownField`]; system columns are ignored. Rows whose id
/// has no baseline counterpart are listed in [`Diff::unknown_features`].
/// Rows with a blank id are left out; edited ones are listed in
/// [`Diff::skipped_rows`].
///
/// # Errors
///
/// Returns [`DiffError`] when a snapshot has duplicate ids, or a row's
/// feature type differs between snapshots.
pub fn compute_changes(
    baseline: &[FeatureRecord],
    edited: &[EditedRecord],
) -> Result<Diff, DiffError> {
    let index = index_rows(baseline, Snapshot::Baseline)?;
    let mut seen = HashSet::with_capacity(edited.len());
    let mut diff = Diff::default();
    let mut features = Vec::new();

    for (row, record) in edited.iter().enumerate() {
        if record.id.trim().is_empty() {
            debug!("edited row {row} has no feature id");
            diff.skipped_rows.push(row);
            continue;
        }
        if !seen.insert(record.id.as_str()) {
            return Err(DiffError::DuplicateFeature {
                id: record.id.clone(),
                snapshot: Snapshot::Edited,
            });
        }

        let Some(original) = index.get(record.id.as_str()) else {
            debug!("feature {} not in baseline", record.id);
            diff.unknown_features.push(record.id.clone());
            continue;
        };
        if original.feature_type != record.feature_type {
            return Err(DiffError::FeatureTypeMismatch {
                id: record.id.clone(),
                baseline: original.feature_type,
                edited: record.feature_type,
            });
        }

        let changes = compare_record(original, record, &mut diff.invalid);
        if !changes.is_empty() {
            features.push(FeatureChanges {
                feature_id: record.id.clone(),
                feature_type: record.feature_type,
                changes,
            });
        }
    }

    diff.change_set = ChangeSet::from_features(features);
    debug!(
        "diff: {} features, {} fields, {} invalid, {} unknown, {} skipped",
        diff.change_set.feature_count(),
        diff.change_set.field_count(),
        diff.invalid.len(),
        diff.unknown_features.len(),
        diff.skipped_rows.len()
    );
    Ok(diff)
}

fn index_rows(
    rows: &[FeatureRecord],
    snapshot: Snapshot,
) -> Result<HashMap<&str, &FeatureRecord>, DiffError> {
    let mut index = HashMap::with_capacity(rows.len());
    for record in rows {
        if record.id.trim().is_empty() {
            continue;
        }
        if index.insert(record.id.as_str(), record).is_some() {
            return Err(DiffError::DuplicateFeature {
                id: record.id.clone(),
                snapshot,
            });
        }
    }
    Ok(index)
}

/// Compare one row pair, pushing rejected edits into `invalid`.
fn compare_record(
    original: &FeatureRecord,
    edited: &EditedRecord,
    invalid: &mut Vec<InvalidChange>,
) -> Vec<FieldChange> {
    let feature_type = edited.feature_type;
    let mut changes = Vec::new();

    for spec in fields_for(feature_type) {
        let (Some(old), Some(new)) = (original.get(spec.name), edited.get(spec.name)) else {
            continue;
        };
        if old == new {
            continue;
        }

        let change = field_change(&edited.id, spec.name, old, new);
        match validate(feature_type, spec.name, new) {
            Ok(new_value) => {
                // Unparseable baseline data compares unequal to any valid edit.
                let old_value = TypedValue::parse(old, spec.field_type);
                if old_value.as_ref() != Some(&new_value) {
                    changes.push(change);
                }
            }
            Err(reason) => invalid.push(InvalidChange { change, reason }),
        }
    }

    // Columns outside the schema: only an actual edit is worth reporting.
    for (name, new) in &edited.fields {
        let in_schema = fields_for(feature_type)
            .iter()
            .any(|f| f.name == name.as_str());
        if is_system_column(name) || in_schema {
            continue;
        }
        let Some(old) = original.get(name) else {
            continue;
        };
        if old != new.as_deref() {
            invalid.push(InvalidChange {
                change: field_change(&edited.id, name, old, new.as_deref()),
                reason: SchemaError::UnknownField {
                    feature_type,
                    field: name.clone(),
                },
            });
        }
    }

    changes
}

fn field_change(id: &str, field: &str, old: Option<&str>, new: Option<&str>) -> FieldChange {
    FieldChange {
        feature_id: id.to_owned(),
        field: field.to_owned(),
        old: old.map(str::to_owned),
        new: new.map(str::to_owned),
    }
}
