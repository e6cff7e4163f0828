//! Update pipeline: change set in, report out.

mod cancel;
mod executor;
mod result;

pub use cancel::CancelFlag;
pub use executor::UpdatePipeline;
pub use result::{
    AbortReason, DryRunResult, OutcomeStatus, Progress, RequestPreview, UpdateOutcome, UpdateReport,
};
