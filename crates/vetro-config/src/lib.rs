//! Configuration management for the Vetro feature editor.
//!
//! Parses `vetro.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `api.base_url`
//! - `api.api_key`
//! - `session.store_dir`

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "vetro.toml";

/// Environment variable holding the backend API key.
pub const API_KEY_ENV: &str = "VETRO_API_KEY";

/// Upper bound on `retry.max_attempts`.
const MAX_ATTEMPTS_LIMIT: u32 = 20;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override API base URL.
    pub base_url: Option<String>,
    /// Override maximum attempts per feature.
    pub max_attempts: Option<u32>,
    /// Override session store directory.
    pub store_dir: Option<PathBuf>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vetro API configuration.
    pub api: ApiConfig,
    /// Retry/backoff configuration.
    pub retry: RetryConfig,
    /// Session persistence configuration (paths are relative strings from TOML).
    session: SessionConfigRaw,

    /// Resolved session configuration (set after loading).
    #[serde(skip)]
    pub session_resolved: SessionConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// How feature updates are laid out on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchMode {
    /// `PATCH /features` with a one-feature collection body.
    #[default]
    Collection,
    /// `PATCH /features/{id}` with the changed properties as the body.
    PerFeature,
}

/// Vetro API configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API base URL.
    pub base_url: String,
    /// Backend API key, used when the session has none or prefers it.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Pause after each successful feature, in milliseconds.
    pub delay_between_features_ms: u64,
    /// Request layout.
    pub patch_mode: PatchMode,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.vetro.io/v3".to_owned(),
            api_key: None,
            timeout_secs: 30,
            delay_between_features_ms: 1000,
            patch_mode: PatchMode::Collection,
        }
    }
}

impl ApiConfig {
    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Pause after each successful feature.
    #[must_use]
    pub fn delay_between_features(&self) -> Duration {
        Duration::from_millis(self.delay_between_features_ms)
    }
}

/// Retry and backoff configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per feature, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Upper bound on a single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Random extra delay as a fraction of the computed delay (0.0-1.0).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay_ms: 2000,
            multiplier: 2.0,
            max_delay_ms: 60_000,
            jitter: 0.0,
        }
    }
}

/// Raw session configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SessionConfigRaw {
    store_dir: Option<String>,
}

/// Resolved session configuration with absolute paths.
#[derive(Debug, Default)]
pub struct SessionConfig {
    /// Directory of the persisted session store.
    pub store_dir: PathBuf,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`api.api_key`").
        field: String,
        /// Error message (e.g., "${`VETRO_API_KEY`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `vetro.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, and the
    /// result is validated again.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or a value is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Backend API key: `api.api_key` if set, else `VETRO_API_KEY`.
    ///
    /// Empty values count as unset.
    #[must_use]
    pub fn backend_api_key(&self) -> Option<String> {
        first_non_blank(self.api.api_key.clone(), || std::env::var(API_KEY_ENV).ok())
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(base_url) = &settings.base_url {
            self.api.base_url.clone_from(base_url);
        }
        if let Some(max_attempts) = settings.max_attempts {
            self.retry.max_attempts = max_attempts;
        }
        if let Some(store_dir) = &settings.store_dir {
            self.session_resolved.store_dir.clone_from(store_dir);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            api: ApiConfig::default(),
            retry: RetryConfig::default(),
            session: SessionConfigRaw::default(),
            session_resolved: SessionConfig {
                store_dir: base.join(".vetro").join("session"),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_api()?;
        self.validate_retry()?;
        Ok(())
    }

    fn validate_api(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.api.base_url, "api.base_url")?;
        require_http_url(&self.api.base_url, "api.base_url")?;
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "api.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_retry(&self) -> Result<(), ConfigError> {
        let retry = &self.retry;
        if retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry.max_attempts must be greater than 0".to_owned(),
            ));
        }
        if retry.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(ConfigError::Validation(format!(
                "retry.max_attempts cannot exceed {MAX_ATTEMPTS_LIMIT}"
            )));
        }
        if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
            return Err(ConfigError::Validation(
                "retry.multiplier must be at least 1.0".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&retry.jitter) {
            return Err(ConfigError::Validation(
                "retry.jitter must be between 0.0 and 1.0".to_owned(),
            ));
        }
        if retry.max_delay_ms < retry.base_delay_ms {
            return Err(ConfigError::Validation(
                "retry.max_delay_ms cannot be less than retry.base_delay_ms".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.api.base_url = expand::expand_env(&self.api.base_url, "api.base_url")?;

        if let Some(ref key) = self.api.api_key {
            self.api.api_key = Some(expand::expand_env(key, "api.api_key")?);
        }

        if let Some(ref dir) = self.session.store_dir {
            self.session.store_dir = Some(expand::expand_env(dir, "session.store_dir")?);
        }

        Ok(())
    }

    /// Resolve relative paths against the config file's directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let store_dir = self
            .session
            .store_dir
            .as_deref()
            .map_or_else(|| config_dir.join(".vetro").join("session"), |d| config_dir.join(d));
        self.session_resolved = SessionConfig { store_dir };
    }
}

fn first_non_blank(
    primary: Option<String>,
    fallback: impl FnOnce() -> Option<String>,
) -> Option<String> {
    let non_blank = |key: &String| !key.trim().is_empty();
    primary.filter(non_blank).or_else(|| fallback().filter(non_blank))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.api.base_url, "https://api.vetro.io/v3");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.api.delay_between_features(), Duration::from_secs(1));
        assert_eq!(config.api.patch_mode, PatchMode::Collection);
        assert_eq!(config.retry.max_attempts, 6);
        assert_eq!(config.retry.base_delay_ms, 2000);
        assert_eq!(
            config.session_resolved.store_dir,
            PathBuf::from("/test/.vetro/session")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.api.base_url, "https://api.vetro.io/v3");
        assert_eq!(config.retry.multiplier, 2.0);
    }

    #[test]
    fn test_parse_api_config() {
        let toml = r#"
[api]
base_url = "https://staging.vetro.io/v3"
api_key = "abc"
timeout_secs = 10
delay_between_features_ms = 0
patch_mode = "per_feature"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.api.base_url, "https://staging.vetro.io/v3");
        assert_eq!(config.api.api_key.as_deref(), Some("abc"));
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
        assert_eq!(config.api.delay_between_features(), Duration::ZERO);
        assert_eq!(config.api.patch_mode, PatchMode::PerFeature);
    }

    #[test]
    fn test_parse_retry_config() {
        let toml = r"
[retry]
max_attempts = 3
base_delay_ms = 100
multiplier = 3.0
max_delay_ms = 1000
jitter = 0.25
";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 100);
        assert_eq!(config.retry.multiplier, 3.0);
        assert_eq!(config.retry.max_delay_ms, 1000);
        assert_eq!(config.retry.jitter, 0.25);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_patch_mode_rejected() {
        let toml = r#"
[api]
patch_mode = "batch"
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases: Vec<(&str, fn(&mut Config))> = vec![
            ("api.base_url", |c: &mut Config| c.api.base_url = "ftp://x".to_owned()),
            ("api.timeout_secs", |c: &mut Config| c.api.timeout_secs = 0),
            ("retry.max_attempts", |c: &mut Config| c.retry.max_attempts = 0),
            ("retry.max_attempts", |c: &mut Config| c.retry.max_attempts = 50),
            ("retry.multiplier", |c: &mut Config| c.retry.multiplier = 0.5),
            ("retry.jitter", |c: &mut Config| c.retry.jitter = 1.5),
            ("retry.max_delay_ms", |c: &mut Config| c.retry.max_delay_ms = 1),
        ];
        for (field, mutate) in cases {
            let mut config = Config::default_with_base(Path::new("/test"));
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, ConfigError::Validation(_)),
                "Expected ConfigError::Validation, got {err:?}"
            );
            assert!(err.to_string().contains(field), "{err} should mention {field}");
        }
    }

    #[test]
    fn test_resolve_store_dir() {
        let toml = r#"
[session]
store_dir = "state"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));
        assert_eq!(
            config.session_resolved.store_dir,
            PathBuf::from("/project/state")
        );
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            max_attempts: Some(2),
            store_dir: Some(PathBuf::from("/elsewhere/session")),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(
            config.session_resolved.store_dir,
            PathBuf::from("/elsewhere/session")
        );
        assert_eq!(config.api.base_url, "https://api.vetro.io/v3"); // Unchanged
    }

    #[test]
    fn test_backend_key_prefers_config_value() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.api.api_key = Some("from-config".to_owned());
        assert_eq!(config.backend_api_key().as_deref(), Some("from-config"));
    }

    #[test]
    fn test_blank_config_key_falls_back() {
        let env = || Some("from-env".to_owned());
        assert_eq!(
            first_non_blank(Some(String::new()), env).as_deref(),
            Some("from-env")
        );
        assert_eq!(
            first_non_blank(Some("  ".to_owned()), env).as_deref(),
            Some("from-env")
        );
        assert_eq!(first_non_blank(None, env).as_deref(), Some("from-env"));
        assert_eq!(
            first_non_blank(Some("cfg".to_owned()), env).as_deref(),
            Some("cfg")
        );
        assert_eq!(first_non_blank(None, || Some(" ".to_owned())), None);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("vetro.toml");
        std::fs::write(
            &path,
            r#"
[api]
base_url = "https://${VETRO_TEST_LOAD_HOST:-api.vetro.io}/v3"

[retry]
max_attempts = 4
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.api.base_url, "https://api.vetro.io/v3");
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(
            config.session_resolved.store_dir,
            tmp.path().join(".vetro/session")
        );
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/vetro.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_rejects_invalid_cli_override() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("vetro.toml");
        std::fs::write(&path, "").unwrap();
        let overrides = CliSettings {
            max_attempts: Some(0),
            ..Default::default()
        };
        let err = Config::load(Some(&path), Some(&overrides)).unwrap_err();
        assert!(err.to_string().contains("retry.max_attempts"));
    }
}
