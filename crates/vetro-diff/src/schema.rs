//! Static catalogue of feature types and their editable fields.
//!
//! Adding a feature type means adding a variant to [`FeatureType`] and a
//! field table below. Field order in each table is the order changes are
//! reported and submitted in.

use std::str::FromStr;

use serde::Serialize;

use crate::error::SchemaError;
use crate::record::is_system_column;
use crate::value::TypedValue;

/// Kind of infrastructure asset a row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    /// Utility pole.
    Pole,
    /// Underground access box.
    Handhole,
    /// Customer service drop location.
    ServiceLocation,
    /// Splice enclosure mounted on a strand.
    AerialSpliceClosure,
    /// Flower pot dead end.
    FlowerPotDeadEnd,
}

/// Declared type of an editable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Free text.
    String,
    /// Finite decimal number.
    Number,
    /// Yes/no flag.
    Boolean,
    /// One of a closed set of values.
    Enum(&'static [&'static str]),
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Boolean => f.write_str("boolean"),
            Self::Enum(variants) => write!(f, "one of [{}]", variants.join(", ")),
        }
    }
}

/// An editable field of a feature type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Column name as exported by Vetro.
    pub name: &'static str,
    /// Declared value type.
    pub field_type: FieldType,
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        field_type: FieldType::String,
    }
}

const fn number(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        field_type: FieldType::Number,
    }
}

const fn flag(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        field_type: FieldType::Boolean,
    }
}

const fn one_of(name: &'static str, variants: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        name,
        field_type: FieldType::Enum(variants),
    }
}

const BUILD_STATES: &[&str] = &["Proposed", "Existing", "Under Construction", "As-Built"];
const DROP_TYPES: &[&str] = &["Aerial", "Underground"];

const FLOWER_POT_DEAD_END: &[FieldSpec] = &[
    text("ID"),
    text("Location"),
    text("Name"),
    text("Notes"),
    text("Size"),
    text("Type"),
    text("RUS Code"),
];

const SERVICE_LOCATION: &[FieldSpec] = &[
    text("ID"),
    text("Name"),
    text("Address"),
    text("Street Address"),
    text("City"),
    text("State"),
    // Kept as text to preserve leading zeros.
    text("Zip Code"),
    text("Location Type"),
    text("Note"),
    one_of("Drop Type", DROP_TYPES),
    one_of("Build", BUILD_STATES),
    number("Latitude"),
    text("Source"),
    text("County"),
];

const HANDHOLE: &[FieldSpec] = &[
    text("ID"),
    text("Name"),
    text("Location"),
    text("Type"),
    text("Note"),
    one_of("Build", BUILD_STATES),
    text("Owner"),
    text("RUS Code"),
    text("Size"),
    flag("MST"),
    flag("Splicing"),
];

const AERIAL_SPLICE_CLOSURE: &[FieldSpec] = &[
    text("ID"),
    text("Name"),
    text("Owner"),
    text("Location"),
    text("Links"),
    text("Structure ID"),
    text("Note"),
    one_of("Build", BUILD_STATES),
    text("RUS Code"),
    text("HO 1"),
];

const POLE: &[FieldSpec] = &[
    text("ID"),
    text("Road Name"),
    text("Town"),
    text("Project"),
    text("State"),
    text("Owner"),
    text("Elco Id"),
    text("Telco Id"),
    one_of("Drop Type", DROP_TYPES),
    text("Status"),
    flag("Make Ready Required"),
    flag("Licensed"),
    number("Attachment Height"),
    number("Age"),
    text("Class"),
    number("Diameter"),
    number("Height"),
    text("Links"),
    text("Make Ready LoE"),
    text("Material"),
    flag("Permitted"),
    flag("Surveyed"),
    text("Type"),
    number("Latitude"),
    text("Survey Date"),
    number("Longitude"),
    text("Make Ready Explanation"),
    text("Assigned To"),
    text("Permit Number"),
];

/// File-name keywords, checked in order.
const DETECT_KEYWORDS: &[(&str, FeatureType)] = &[
    ("flower", FeatureType::FlowerPotDeadEnd),
    ("pot", FeatureType::FlowerPotDeadEnd),
    ("service", FeatureType::ServiceLocation),
    ("handhole", FeatureType::Handhole),
    ("splice", FeatureType::AerialSpliceClosure),
    ("closure", FeatureType::AerialSpliceClosure),
    ("pole", FeatureType::Pole),
];

impl FeatureType {
    /// All known feature types.
    pub const ALL: [Self; 5] = [
        Self::Pole,
        Self::Handhole,
        Self::ServiceLocation,
        Self::AerialSpliceClosure,
        Self::FlowerPotDeadEnd,
    ];

    /// Human-readable name as used by Vetro.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Pole => "Pole",
            Self::Handhole => "Handhole",
            Self::ServiceLocation => "Service Location",
            Self::AerialSpliceClosure => "Aerial Splice Closure",
            Self::FlowerPotDeadEnd => "Flower Pot Dead End",
        }
    }

    /// Guess the feature type from an export file name.
    ///
    /// Matching is case-insensitive on keywords such as `pole` or `splice`.
    #[must_use]
    pub fn detect(file_name: &str) -> Option<Self> {
        let lower = file_name.to_lowercase();
        DETECT_KEYWORDS
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .map(|(_, feature_type)| *feature_type)
    }
}

impl std::fmt::Display for FeatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for FeatureType {
    type Err = String;

    /// Accepts display names ("Aerial Splice Closure") as well as
    /// kebab/snake case ("aerial-splice-closure").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self::ALL
            .into_iter()
            .find(|ty| {
                ty.display_name()
                    .chars()
                    .filter(char::is_ascii_alphanumeric)
                    .map(|c| c.to_ascii_lowercase())
                    .eq(key.chars())
            })
            .ok_or_else(|| format!("unknown feature type '{s}'"))
    }
}

/// Editable fields of `feature_type`, in declaration order.
#[must_use]
pub fn fields_for(feature_type: FeatureType) -> &'static [FieldSpec] {
    match feature_type {
        FeatureType::Pole => POLE,
        FeatureType::Handhole => HANDHOLE,
        FeatureType::ServiceLocation => SERVICE_LOCATION,
        FeatureType::AerialSpliceClosure => AERIAL_SPLICE_CLOSURE,
        FeatureType::FlowerPotDeadEnd => FLOWER_POT_DEAD_END,
    }
}

/// Look up a single editable field.
#[must_use]
pub fn field_spec(feature_type: FeatureType, field: &str) -> Option<&'static FieldSpec> {
    fields_for(feature_type).iter().find(|f| f.name == field)
}

/// Check `value` against the declared type of `field`.
///
/// Returns the value resolved into its declared type. System columns such
/// as `vetro_id` are never editable and report [`SchemaError::UnknownField`].
pub fn validate(
    feature_type: FeatureType,
    field: &str,
    value: Option<&str>,
) -> Result<TypedValue, SchemaError> {
    let spec = field_spec(feature_type, field)
        .filter(|_| !is_system_column(field))
        .ok_or_else(|| SchemaError::UnknownField {
            feature_type,
            field: field.to_owned(),
        })?;

    TypedValue::parse(value, spec.field_type).ok_or_else(|| SchemaError::InvalidType {
        feature_type,
        field: field.to_owned(),
        expected: spec.field_type,
        value: value.unwrap_or_default().to_owned(),
    })
}
