//! Vetro REST API client.
//!
//! Provides a sync HTTP client that submits one feature's changes per
//! `PATCH` request, retrying transient failures with exponential backoff.

mod transport;

use std::time::Duration;

use tracing::{info, warn};
use vetro_config::{ApiConfig, PatchMode, RetryConfig};
use vetro_diff::FeatureChanges;

pub use transport::{HttpResponse, TOKEN_HEADER, Transport, UreqTransport};

use crate::error::SubmitError;
use crate::pipeline::UpdateOutcome;
use crate::request::PatchRequest;
use crate::retry::{RetryPolicy, RetryState};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.vetro.io/v3";

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT: u64 = 30;

/// Vetro REST API client.
pub struct VetroClient {
    transport: Box<dyn Transport>,
    base_url: String,
    patch_mode: PatchMode,
    retry: RetryPolicy,
    throttle: Duration,
}

impl VetroClient {
    /// Create a client for `base_url` using the HTTP transport and defaults.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_transport(
            UreqTransport::new(Duration::from_secs(DEFAULT_TIMEOUT)),
            base_url,
        )
    }

    /// Create client from config values.
    #[must_use]
    pub fn from_config(api: &ApiConfig, retry: &RetryConfig) -> Self {
        Self::with_transport(UreqTransport::new(api.timeout()), &api.base_url)
            .patch_mode(api.patch_mode)
            .retry_policy(RetryPolicy::from(retry))
            .throttle(api.delay_between_features())
    }

    /// Create a client over an arbitrary transport.
    ///
    /// Starts with the default retry policy and no throttling.
    #[must_use]
    pub fn with_transport(transport: impl Transport + 'static, base_url: &str) -> Self {
        Self {
            transport: Box::new(transport),
            base_url: base_url.trim_end_matches('/').to_owned(),
            patch_mode: PatchMode::default(),
            retry: RetryPolicy::default(),
            throttle: Duration::ZERO,
        }
    }

    /// Set the request layout.
    #[must_use]
    pub fn patch_mode(mut self, mode: PatchMode) -> Self {
        self.patch_mode = mode;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Set the pause taken after each successful feature.
    #[must_use]
    pub fn throttle(mut self, delay: Duration) -> Self {
        self.throttle = delay;
        self
    }

    /// Pause taken after each successful feature.
    pub(crate) fn throttle_delay(&self) -> Duration {
        self.throttle
    }

    /// Build the request that [`submit_change`](Self::submit_change) would send.
    #[must_use]
    pub fn request_for(&self, feature: &FeatureChanges) -> PatchRequest {
        PatchRequest::build(&self.base_url, self.patch_mode, feature)
    }

    /// Submit one feature's changes, retrying transient failures.
    ///
    /// Sends a single `PATCH` carrying only the changed fields. Retryable
    /// errors (429, 5xx, timeouts, connection failures) are retried per the
    /// retry policy; anything else fails the feature at once. The returned
    /// outcome is either succeeded or failed, never skipped.
    pub fn submit_change(&self, feature: &FeatureChanges, api_key: &str) -> UpdateOutcome {
        let request = self.request_for(feature);
        let mut retry = RetryState::new(&self.retry);
        let mut rate_limited = false;

        loop {
            let attempt = retry.begin_attempt();
            info!(
                "Updating feature {} ({} fields, attempt {}/{})",
                feature.feature_id,
                feature.changes.len(),
                attempt,
                self.retry.max_attempts
            );

            let error = match self.send(&request, api_key) {
                Ok(()) => {
                    retry.succeed();
                    return UpdateOutcome::succeeded(&feature.feature_id, attempt)
                        .with_rate_limited(rate_limited);
                }
                Err(error) => error,
            };
            rate_limited |= error.is_rate_limited();

            match retry.fail(&error) {
                Some(delay) => {
                    warn!(
                        "Feature {} failed ({error}), backing off for {:.1}s",
                        feature.feature_id,
                        delay.as_secs_f64()
                    );
                    std::thread::sleep(delay);
                }
                None => {
                    warn!(
                        "Feature {} failed after {} attempt(s): {error}",
                        feature.feature_id, attempt
                    );
                    return UpdateOutcome::failed(&feature.feature_id, error, attempt)
                        .with_rate_limited(rate_limited);
                }
            }
        }
    }

    fn send(&self, request: &PatchRequest, api_key: &str) -> Result<(), SubmitError> {
        let response = self.transport.patch(request, api_key)?;
        match SubmitError::from_status(response.status, response.body) {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use vetro_diff::{FeatureType, FieldChange};

    use super::*;
    use crate::error::TransportError;
    use crate::mock::{MockReply, MockTransport};
    use crate::pipeline::OutcomeStatus;

    fn pole_height(id: &str, new: &str) -> FeatureChanges {
        FeatureChanges {
            feature_id: id.to_owned(),
            feature_type: FeatureType::Pole,
            changes: vec![FieldChange {
                feature_id: id.to_owned(),
                field: "Height".to_owned(),
                old: Some("30".to_owned()),
                new: Some(new.to_owned()),
            }],
        }
    }

    fn client(mock: &MockTransport, attempts: u32) -> VetroClient {
        VetroClient::with_transport(mock.clone(), "https://api.vetro.io/v3/")
            .retry_policy(RetryPolicy::immediate(attempts))
    }

    #[test]
    fn test_success_first_try() {
        let mock = MockTransport::new();
        let outcome = client(&mock, 3).submit_change(&pole_height("42", "35"), "key");

        assert_eq!(outcome.status, OutcomeStatus::Succeeded);
        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.rate_limited);
        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://api.vetro.io/v3/features");
        assert_eq!(requests[0].api_key, "key");
    }

    #[test]
    fn test_retries_server_error_then_succeeds() {
        let mock =
            MockTransport::new().with_replies([MockReply::status(500), MockReply::status(200)]);
        let outcome = client(&mock, 3).submit_change(&pole_height("42", "35"), "key");

        assert_eq!(outcome.status, OutcomeStatus::Succeeded);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(mock.requests().len(), 2);
    }

    #[test]
    fn test_retries_rate_limit_and_timeout() {
        let mock = MockTransport::new().with_replies([
            MockReply::status(429),
            MockReply::error(TransportError::Timeout("30s".to_owned())),
            MockReply::status(204),
        ]);
        let outcome = client(&mock, 5).submit_change(&pole_height("1", "2"), "key");
        assert_eq!(outcome.status, OutcomeStatus::Succeeded);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.rate_limited);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mock = MockTransport::new().with_replies((0..10).map(|_| MockReply::status(503)));
        let outcome = client(&mock, 3).submit_change(&pole_height("1", "2"), "key");

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.attempts, 3);
        assert!(matches!(
            outcome.error,
            Some(SubmitError::Transient { status: 503, .. })
        ));
        assert_eq!(mock.requests().len(), 3);
    }

    #[test]
    fn test_validation_error_not_retried() {
        let mock = MockTransport::new()
            .with_replies([MockReply::status(400).with_body("Height must be numeric")]);
        let outcome = client(&mock, 5).submit_change(&pole_height("1", "x"), "key");

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(
            outcome.error,
            Some(SubmitError::Validation {
                status: 400,
                body: "Height must be numeric".to_owned()
            })
        );
    }

    #[test]
    fn test_auth_error_not_retried() {
        let mock = MockTransport::new().with_replies([MockReply::status(401)]);
        let outcome = client(&mock, 5).submit_change(&pole_height("1", "2"), "bad");
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.error.as_ref().is_some_and(SubmitError::is_fatal_for_run));
    }

    #[test]
    fn test_per_feature_mode_sends_flat_body() {
        let mock = MockTransport::new();
        let client = client(&mock, 1).patch_mode(PatchMode::PerFeature);
        client.submit_change(&pole_height("42", "35"), "key");

        let requests = mock.requests();
        assert_eq!(requests[0].url, "https://api.vetro.io/v3/features/42");
        assert_eq!(requests[0].body, json!({ "Height": "35" }));
    }

    #[test]
    fn test_from_config() {
        let api = ApiConfig {
            base_url: "https://example.test/v3/".to_owned(),
            delay_between_features_ms: 250,
            patch_mode: PatchMode::PerFeature,
            ..ApiConfig::default()
        };
        let retry = RetryConfig {
            max_attempts: 2,
            ..RetryConfig::default()
        };
        let client = VetroClient::from_config(&api, &retry);

        assert_eq!(client.base_url, "https://example.test/v3");
        assert_eq!(client.patch_mode, PatchMode::PerFeature);
        assert_eq!(client.retry.max_attempts, 2);
        assert_eq!(client.throttle_delay(), Duration::from_millis(250));
    }
}
