//! Vetro feature API client and update pipeline.
//!
//! This crate submits a [`ChangeSet`](vetro_diff::ChangeSet) to the Vetro
//! REST API, one feature per `PATCH` request:
//!
//! - [`RetryPolicy`] and [`RetryState`]: exponential backoff and the
//!   per-call retry state machine
//! - [`VetroClient`]: authenticated requests carrying only changed fields,
//!   with transient failures retried
//! - [`UpdatePipeline`]: sequential run over a change set producing an
//!   [`UpdateReport`], stopping early only on a rejected API key or
//!   cancellation
//!
//! The network sits behind the [`Transport`] trait. [`MockTransport`]
//! (behind the `mock` feature flag) replays scripted responses for tests.
//!
//! # Example
//!
//! ```ignore
//! use vetro_api::{UpdatePipeline, VetroClient};
//!
//! let client = VetroClient::new("https://api.vetro.io/v3");
//! let report = UpdatePipeline::new(&client).run(&diff.change_set, &api_key)?;
//! println!("{} succeeded, {} failed", report.succeeded, report.failed);
//! ```

mod client;
mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod pipeline;
mod request;
mod retry;

pub use client::{
    DEFAULT_BASE_URL, HttpResponse, TOKEN_HEADER, Transport, UreqTransport, VetroClient,
};
pub use error::{PipelineError, SubmitError, TransportError};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockReply, MockTransport, RecordedRequest};
pub use pipeline::{
    AbortReason, CancelFlag, DryRunResult, OutcomeStatus, Progress, RequestPreview, UpdateOutcome,
    UpdatePipeline, UpdateReport,
};
pub use request::PatchRequest;
pub use retry::{RetryPhase, RetryPolicy, RetryState};
