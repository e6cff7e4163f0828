//! CLI error types.

use vetro_api::PipelineError;
use vetro_config::ConfigError;
use vetro_diff::DiffError;
use vetro_session::SessionError;

use crate::input::InputError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Input(#[from] InputError),

    #[error("{0}")]
    Diff(#[from] DiffError),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("{failed} feature(s) failed, {skipped} skipped")]
    Incomplete { failed: usize, skipped: usize },
}
