//! Typed cell values.
//!
//! Cells arrive as untyped text. [`TypedValue::parse`] resolves them into the
//! declared field type so that equality is type-aware: `"1"` and `"1.0"` are
//! the same number, `"Yes"` and `"true"` the same boolean.

use serde::Serialize;

use crate::schema::FieldType;

/// A cell value resolved into its declared type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    /// Empty cell.
    Null,
    /// Free text, compared exactly.
    Text(String),
    /// Finite number.
    Number(f64),
    /// Truth value.
    Boolean(bool),
    /// One of the declared enum variants.
    Enum(&'static str),
}

impl TypedValue {
    /// Parse raw cell text as `field_type`.
    ///
    /// `None` (an empty cell) is valid for every type. Returns `None` when the
    /// text is not a valid value of the type.
    #[must_use]
    pub fn parse(raw: Option<&str>, field_type: FieldType) -> Option<Self> {
        let Some(raw) = raw else {
            return Some(Self::Null);
        };
        match field_type {
            FieldType::String => Some(Self::Text(raw.to_owned())),
            FieldType::Number => parse_number(raw).map(Self::Number),
            FieldType::Boolean => parse_bool(raw).map(Self::Boolean),
            FieldType::Enum(variants) => variants
                .iter()
                .copied()
                .find(|v| *v == raw)
                .map(Self::Enum),
        }
    }

    /// Whether this is an empty cell.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let n: f64 = raw.trim().parse().ok()?;
    n.is_finite().then_some(n)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}
