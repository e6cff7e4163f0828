//! HTTP transport seam.

use std::time::Duration;

use ureq::Agent;

use crate::error::TransportError;
use crate::request::PatchRequest;

/// Header carrying the Vetro API key.
pub const TOKEN_HEADER: &str = "Token";

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body (may contain error details).
    pub body: String,
}

/// Sends `PATCH` requests.
///
/// Implementations return `Ok` for every received response, whatever the
/// status; only failures to get a response at all are errors.
pub trait Transport: Send + Sync {
    /// Send `request` authenticated with `api_key`.
    fn patch(&self, request: &PatchRequest, api_key: &str) -> Result<HttpResponse, TransportError>;
}

/// Blocking HTTP transport backed by `ureq`.
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    /// Create a transport whose calls each time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn patch(&self, request: &PatchRequest, api_key: &str) -> Result<HttpResponse, TransportError> {
        let response = self
            .agent
            .patch(&request.url)
            .header(TOKEN_HEADER, api_key)
            .header("Accept", "application/json")
            .send_json(&request.body)?;

        let status = response.status().as_u16();
        let mut body_reader = response.into_body();
        let body = body_reader
            .read_to_string()
            .unwrap_or_else(|_| "(unable to read response body)".to_owned());

        Ok(HttpResponse { status, body })
    }
}
