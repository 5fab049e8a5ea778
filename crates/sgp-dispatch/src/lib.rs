//! sgp-dispatch
//!
//! Inline vs deferred execution of reconciliation runs.
//!
//! Small batches run on the caller's task and return a finished status. Large
//! batches are staged in file storage and handed to a [`JobQueue`]; callers
//! poll by job id until the worker finishes.

mod dispatcher;
mod error;
mod queue;
mod staging;

pub use dispatcher::{
    DispatchMode, Dispatcher, JobHandle, PollOutcome, RunDeferred, RunInline, RunStrategy,
    Submission, DEFAULT_DEFER_THRESHOLD,
};
pub use error::DispatchError;
pub use queue::{JobFn, JobFuture, JobId, JobQueue, JobState, ProgressReporter, TokioJobQueue};
pub use staging::{load_staged, stage_batch, staging_key};
