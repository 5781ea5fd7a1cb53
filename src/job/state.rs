//! Job State Machine
//!
//! Seven states: three in-flight, four terminal. Transitions are
//! monotonic; once a job reaches a terminal state it stays there, and an
//! in-flight job never moves backwards (a `Processing` job does not
//! return to `Waiting` even if the service says so).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted by the service, not yet observed by a poll
    Submitted,
    /// Queued on the service side
    Waiting,
    /// Generation running
    Processing,
    /// Finished with result URLs
    Succeeded,
    /// Finished without results
    Failed,
    /// Poll budget exhausted before a terminal service state
    TimedOut,
    /// Cancellation observed before a terminal service state
    Cancelled,
}

impl JobState {
    /// Whether this state ends the job
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::TimedOut | JobState::Cancelled
        )
    }

    fn rank(&self) -> u8 {
        match self {
            JobState::Submitted => 0,
            JobState::Waiting => 1,
            JobState::Processing => 2,
            JobState::Succeeded | JobState::Failed | JobState::TimedOut | JobState::Cancelled => 3,
        }
    }

    /// Whether moving to `next` respects monotonicity
    pub fn can_advance_to(&self, next: JobState) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Submitted => "submitted",
            JobState::Waiting => "waiting",
            JobState::Processing => "processing",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::TimedOut => "timed_out",
            JobState::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// One remote generation job being driven to completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Remote job id
    pub id: String,

    /// Current lifecycle state
    pub state: JobState,

    /// When the job was submitted
    pub submitted_at: DateTime<Utc>,

    /// Status queries performed so far
    pub poll_count: u32,

    /// Status-query budget before the job times out
    pub max_polls: u32,

    /// Result URLs, populated on success
    pub result_urls: Vec<String>,
}

impl GenerationJob {
    /// A freshly submitted job
    pub fn new(id: impl Into<String>, max_polls: u32, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            state: JobState::Submitted,
            submitted_at,
            poll_count: 0,
            max_polls,
            result_urls: Vec::new(),
        }
    }

    /// Advance the state machine; backward transitions are ignored.
    ///
    /// Returns whether the state actually changed.
    pub fn advance(&mut self, next: JobState) -> bool {
        if self.state == next || !self.state.can_advance_to(next) {
            return false;
        }
        self.state = next;
        true
    }
}
