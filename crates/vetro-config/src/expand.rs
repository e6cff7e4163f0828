//! Environment variable expansion for configuration strings.

use crate::ConfigError;

/// Expand environment variable references in a string.
///
/// Supports:
/// - `${VAR}` - expands to the value of VAR, errors if unset
/// - `${VAR:-default}` - expands to VAR if set, otherwise uses default
///
/// Bare `$VAR` syntax is left untouched.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, LookupError> {
        std::env::var(var).map(Some).map_err(|_| LookupError {
            var_name: var.to_owned(),
        })
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.cause.var_name),
    })
}

struct LookupError {
    var_name: String,
}
