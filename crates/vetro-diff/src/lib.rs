//! Feature schema and change detection for Vetro bulk edits.
//!
//! This crate turns two snapshots of feature rows (the baseline as loaded and
//! the rows after editing) into the minimal set of per-field changes to
//! submit:
//!
//! - [`FeatureType`] and [`fields_for`]: static catalogue of editable fields
//! - [`validate`]: resolves raw cell text into a [`TypedValue`]
//! - [`compute_changes`]: produces a [`Diff`] holding the submittable
//!   [`ChangeSet`] plus everything that was rejected
//!
//! # Example
//!
//! ```
//! use vetro_diff::{FeatureRecord, FeatureType, compute_changes};
//!
//! let baseline = vec![FeatureRecord::new("42", FeatureType::Pole).with_field("Height", "30")];
//! let edited = vec![FeatureRecord::new("42", FeatureType::Pole).with_field("Height", "35")];
//!
//! let diff = compute_changes(&baseline, &edited).unwrap();
//! assert_eq!(diff.change_set.field_count(), 1);
//! ```

mod diff;
mod error;
mod record;
mod schema;
mod value;

pub use diff::{ChangeSet, Diff, FeatureChanges, FieldChange, InvalidChange, compute_changes};
pub use error::{DiffError, SchemaError, Snapshot};
pub use record::{EditedRecord, FeatureRecord, ID_COLUMN, is_system_column};
pub use schema::{FeatureType, FieldSpec, FieldType, field_spec, fields_for, validate};
pub use value::TypedValue;
