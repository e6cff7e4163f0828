//! Session values and partial updates.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Preference entry selecting which API key to use.
pub const KEY_PREFERENCE: &str = "key_preference";

/// Which API key a run should use when both are available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPreference {
    /// The key saved in the session, falling back to the backend key.
    #[default]
    User,
    /// The backend key from configuration.
    Backend,
}

impl KeyPreference {
    /// Stored preference value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Backend => "backend",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "Use user key (if set)",
            Self::Backend => "Use backend key",
        }
    }
}

impl fmt::Display for KeyPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for KeyPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::User, Self::Backend]
            .into_iter()
            .find(|p| s.eq_ignore_ascii_case(p.as_str()) || s == p.label())
            .ok_or_else(|| format!("unknown key preference '{s}' (expected user or backend)"))
    }
}

/// API key and preferences for one user session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub preferences: BTreeMap<String, String>,
}

impl SessionState {
    /// Saved key preference; unknown values read as the default.
    #[must_use]
    pub fn key_preference(&self) -> KeyPreference {
        self.preferences
            .get(KEY_PREFERENCE)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    /// Key an API call should use, given the backend key if one is configured.
    ///
    /// The user key wins when preferred and set; otherwise the backend key;
    /// otherwise the user key. Blank keys count as unset.
    #[must_use]
    pub fn effective_api_key(&self, backend_key: Option<&str>) -> Option<String> {
        let user = non_blank(self.api_key.as_deref());
        let backend = non_blank(backend_key);
        match self.key_preference() {
            KeyPreference::User => user.or(backend),
            KeyPreference::Backend => backend.or(user),
        }
        .map(str::to_owned)
    }

    /// Whether a user key is saved.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        non_blank(self.api_key.as_deref()).is_some()
    }
}

fn non_blank(key: Option<&str>) -> Option<&str> {
    key.map(str::trim).filter(|k| !k.is_empty())
}

/// Partial update applied by [`SharedState::save`](crate::SharedState::save).
///
/// Unset parts leave the current state untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub api_key: Option<String>,
    pub preferences: BTreeMap<String, String>,
}

impl SessionPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the user API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set one preference entry.
    #[must_use]
    pub fn preference(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.preferences.insert(name.into(), value.into());
        self
    }

    /// Set the key preference.
    #[must_use]
    pub fn key_preference(self, preference: KeyPreference) -> Self {
        self.preference(KEY_PREFERENCE, preference.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.preferences.is_empty()
    }
}
