//! Poll Loop Controller
//!
//! Drives a submitted job to a terminal state by querying its status on a
//! fixed interval. Cancellation is checked twice per tick: at the loop
//! head and again right after the progress callback, since the callback
//! is where a caller typically decides to stop. A failed query or an
//! unrecognized remote state ends the loop; there is no retry here.

use std::time::Duration;
use tracing::debug;

use crate::api::client::{GenerationApi, QueryError};
use crate::api::protocol::RemoteJobState;

use super::cancel::CancellationToken;
use super::state::{GenerationJob, JobState};

/// Error types for the poll loop
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// A status query failed
    #[error("Status query failed: {0}")]
    Query(#[from] QueryError),

    /// The service reported a state outside its four-state contract
    #[error("Unrecognized job state: {0}")]
    UnrecognizedState(String),

    /// The service reported success but returned no result URLs
    #[error("Job succeeded without result URLs")]
    MissingResult,
}

/// How a poll loop settled.
///
/// All four cases are ordinary outcomes, not errors; in particular a
/// cancelled job must not be presented as a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Job finished with result URLs
    Succeeded(Vec<String>),
    /// Job finished without results
    Failed(String),
    /// Poll budget exhausted while the job was still in flight
    TimedOut {
        /// Queries performed before giving up
        polls: u32,
    },
    /// Cancellation was observed
    Cancelled,
}

/// Progress report passed to the caller once per tick
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate<'a> {
    /// Remote job id
    pub job_id: &'a str,

    /// Job state after this tick's query
    pub state: JobState,

    /// Queries performed so far, including this one
    pub poll_count: u32,

    /// Query budget
    pub max_polls: u32,
}

/// Polls a job until it reaches a terminal state
#[derive(Debug, Clone)]
pub struct PollLoop {
    interval: Duration,
}

impl PollLoop {
    /// Create a loop that waits `interval` between ticks
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Drive `job` to a terminal state.
    ///
    /// The job's `poll_count`, `state`, and `result_urls` are updated in
    /// place; on return the job is terminal (also on `Err`, where it is
    /// marked failed).
    pub async fn run<F>(
        &self,
        api: &dyn GenerationApi,
        job: &mut GenerationJob,
        mut on_progress: F,
        token: &CancellationToken,
    ) -> Result<JobOutcome, PollError>
    where
        F: FnMut(&ProgressUpdate<'_>),
    {
        loop {
            if token.is_cancelled() {
                job.advance(JobState::Cancelled);
                return Ok(JobOutcome::Cancelled);
            }

            let status = match api.status(&job.id).await {
                Ok(status) => status,
                Err(e) => {
                    job.advance(JobState::Failed);
                    return Err(PollError::Query(e));
                }
            };
            job.poll_count += 1;

            let Some(remote) = RemoteJobState::parse(&status.state) else {
                job.advance(JobState::Failed);
                return Err(PollError::UnrecognizedState(status.state));
            };

            match remote {
                RemoteJobState::Waiting => {
                    job.advance(JobState::Waiting);
                }
                RemoteJobState::Processing => {
                    job.advance(JobState::Processing);
                }
                RemoteJobState::Success | RemoteJobState::Fail => {}
            }
            debug!(
                "Job {} tick {}/{}: {}",
                job.id, job.poll_count, job.max_polls, status.state
            );

            on_progress(&ProgressUpdate {
                job_id: &job.id,
                state: job.state,
                poll_count: job.poll_count,
                max_polls: job.max_polls,
            });

            // The callback may have requested cancellation
            if token.is_cancelled() {
                job.advance(JobState::Cancelled);
                return Ok(JobOutcome::Cancelled);
            }

            match remote {
                RemoteJobState::Success => {
                    if status.result_urls.is_empty() {
                        job.advance(JobState::Failed);
                        return Err(PollError::MissingResult);
                    }
                    job.result_urls = status.result_urls.clone();
                    job.advance(JobState::Succeeded);
                    return Ok(JobOutcome::Succeeded(status.result_urls));
                }
                RemoteJobState::Fail => {
                    job.advance(JobState::Failed);
                    return Ok(JobOutcome::Failed(
                        status
                            .failure_message
                            .unwrap_or_else(|| "unknown failure".to_string()),
                    ));
                }
                RemoteJobState::Waiting | RemoteJobState::Processing => {
                    if job.poll_count >= job.max_polls {
                        job.advance(JobState::TimedOut);
                        return Ok(JobOutcome::TimedOut {
                            polls: job.poll_count,
                        });
                    }
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}
