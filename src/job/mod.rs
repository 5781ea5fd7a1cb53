//! Job Lifecycle
//!
//! The generation job state machine, the cancellation token shared with
//! callers, and the poll loop that drives a job to a terminal state.

pub mod cancel;
pub mod poller;
pub mod state;

pub use cancel::CancellationToken;
pub use poller::{JobOutcome, PollError, PollLoop, ProgressUpdate};
pub use state::{GenerationJob, JobState};
