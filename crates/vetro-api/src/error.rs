//! Error types for Vetro API operations.

use serde::Serialize;

/// Failure while sending a request, before any HTTP status was received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request did not complete within the per-call timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection could not be established or was dropped.
    #[error("connection failed: {0}")]
    Connection(String),
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            err @ ureq::Error::Timeout(_) => Self::Timeout(err.to_string()),
            other => Self::Connection(other.to_string()),
        }
    }
}

/// Classified failure of a single feature update.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmitError {
    /// API key rejected (401/403). Every later call would fail the same way.
    #[error("authentication failed: HTTP {status} - {body}")]
    Auth {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Request rejected for this feature (4xx other than 401/403/429).
    #[error("update rejected: HTTP {status} - {body}")]
    Validation {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Rate limited (429) or server error (5xx).
    #[error("server error: HTTP {status} - {body}")]
    Transient {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Timeout or connection failure.
    #[error("network error: {message}")]
    Network {
        /// Transport error description.
        message: String,
    },
}

impl SubmitError {
    /// Classify a non-success HTTP status. Returns `None` for 2xx.
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Option<Self> {
        match status {
            200..=299 => None,
            401 | 403 => Some(Self::Auth { status, body }),
            429 | 500..=599 => Some(Self::Transient { status, body }),
            _ => Some(Self::Validation { status, body }),
        }
    }

    /// Whether another attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Network { .. })
    }

    /// Whether the whole run must stop.
    #[must_use]
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Whether the service asked us to slow down.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Transient { status: 429, .. })
    }

    /// HTTP status, if one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. }
            | Self::Validation { status, .. }
            | Self::Transient { status, .. } => Some(*status),
            Self::Network { .. } => None,
        }
    }
}

impl From<TransportError> for SubmitError {
    fn from(err: TransportError) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Error that prevents an update run from starting.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// No API key was supplied.
    #[error("no API key configured (set one in settings or provide a backend key)")]
    MissingApiKey,
}
