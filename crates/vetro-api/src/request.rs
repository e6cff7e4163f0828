//! Request bodies for feature updates.

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use serde_json::{Map, Value, json};
use vetro_config::PatchMode;
use vetro_diff::FeatureChanges;

/// A fully built `PATCH` request for one feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchRequest {
    /// Feature the request updates.
    pub feature_id: String,
    /// Target URL.
    pub url: String,
    /// JSON body.
    pub body: Value,
}

impl PatchRequest {
    /// Build the request for `feature` against `base_url`.
    ///
    /// Only the changed fields are included, with their literal edited
    /// values; cleared cells are sent as `null`.
    #[must_use]
    pub fn build(base_url: &str, mode: PatchMode, feature: &FeatureChanges) -> Self {
        let properties = properties(feature);
        let (url, body) = match mode {
            PatchMode::Collection => (
                format!("{base_url}/features"),
                json!({
                    "features": [{
                        "type": "Feature",
                        "x-vetro": { "vetro_id": feature.feature_id },
                        "properties": properties,
                    }]
                }),
            ),
            PatchMode::PerFeature => (
                format!(
                    "{base_url}/features/{}",
                    utf8_percent_encode(&feature.feature_id, NON_ALPHANUMERIC)
                ),
                Value::Object(properties),
            ),
        };
        Self {
            feature_id: feature.feature_id.clone(),
            url,
            body,
        }
    }
}

fn properties(feature: &FeatureChanges) -> Map<String, Value> {
    feature
        .properties()
        .map(|(name, value)| {
            let value = value.map_or(Value::Null, |v| Value::String(v.to_owned()));
            (name.to_owned(), value)
        })
        .collect()
}
