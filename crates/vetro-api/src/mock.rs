//! Scripted transport for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::client::{HttpResponse, Transport};
use crate::error::TransportError;
use crate::request::PatchRequest;

/// One scripted answer.
#[derive(Debug, Clone)]
pub struct MockReply(Result<HttpResponse, TransportError>);

impl MockReply {
    /// Respond with `status` and an empty body.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self(Ok(HttpResponse {
            status,
            body: String::new(),
        }))
    }

    /// Fail without a response.
    #[must_use]
    pub fn error(error: TransportError) -> Self {
        Self(Err(error))
    }

    /// Set the response body.
    #[must_use]
    pub fn with_body(mut self, body: &str) -> Self {
        if let Ok(response) = &mut self.0 {
            response.body = body.to_owned();
        }
        self
    }
}

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub url: String,
    pub body: Value,
    pub api_key: String,
}

#[derive(Default)]
struct Inner {
    replies: VecDeque<MockReply>,
    requests: Vec<RecordedRequest>,
}

/// Transport that replays scripted replies in order and records requests.
///
/// Answers 200 once the script runs out. Clones share the script and the
/// request log, so a test can keep a handle after giving one to a client.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies, answered first-in first-out.
    #[must_use]
    pub fn with_replies(self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        self.lock().replies.extend(replies);
        self
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MockTransport {
    fn patch(&self, request: &PatchRequest, api_key: &str) -> Result<HttpResponse, TransportError> {
        let mut inner = self.lock();
        inner.requests.push(RecordedRequest {
            url: request.url.clone(),
            body: request.body.clone(),
            api_key: api_key.to_owned(),
        });
        inner
            .replies
            .pop_front()
            .map_or_else(|| Ok(HttpResponse { status: 200, body: String::new() }), |r| r.0)
    }
}
