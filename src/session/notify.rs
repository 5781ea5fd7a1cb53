//! Notification Sink
//!
//! The lifecycle and quota machinery signal noteworthy events through
//! this trait instead of rendering anything themselves. The production
//! sink logs; UIs plug in their own.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::quota::{ResourceClass, WindowScope};

/// Quota-related signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageNotice {
    /// Usage reached the warning threshold
    NearLimit {
        class: ResourceClass,
        /// Operations left in the daily window
        remaining_today: u32,
    },
    /// An operation was blocked by a limit
    LimitReached {
        class: ResourceClass,
        scope: WindowScope,
    },
}

/// Job-related signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobNotice {
    /// The service reported failure
    Failed { job_id: String, message: String },
    /// The poll budget ran out
    TimedOut { job_id: String, polls: u32 },
    /// The user stopped the job
    Cancelled { job_id: String },
}

/// Receiver for warning and error signals
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// A quota signal was raised
    async fn usage_notice(&self, notice: UsageNotice);

    /// A job signal was raised
    async fn job_notice(&self, notice: JobNotice);
}

/// Sink that writes every signal to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn usage_notice(&self, notice: UsageNotice) {
        match notice {
            UsageNotice::NearLimit {
                class,
                remaining_today,
            } => {
                warn!(
                    "Only {} {} operations left today",
                    remaining_today, class
                );
            }
            UsageNotice::LimitReached { class, scope } => {
                warn!("{} {} limit reached", scope, class);
            }
        }
    }

    async fn job_notice(&self, notice: JobNotice) {
        match notice {
            JobNotice::Failed { job_id, message } => {
                warn!("Job {} failed: {}", job_id, message);
            }
            JobNotice::TimedOut { job_id, polls } => {
                warn!("Job {} timed out after {} polls", job_id, polls);
            }
            JobNotice::Cancelled { job_id } => {
                info!("Job {} cancelled", job_id);
            }
        }
    }
}

/// Sink that records every signal, for tests
#[derive(Debug, Default)]
pub struct RecordingSink {
    usage: std::sync::Mutex<Vec<UsageNotice>>,
    jobs: std::sync::Mutex<Vec<JobNotice>>,
}

impl RecordingSink {
    /// Empty recording sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Quota signals seen so far
    pub fn usage_notices(&self) -> Vec<UsageNotice> {
        self.usage.lock().unwrap().clone()
    }

    /// Job signals seen so far
    pub fn job_notices(&self) -> Vec<JobNotice> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn usage_notice(&self, notice: UsageNotice) {
        self.usage.lock().unwrap().push(notice);
    }

    async fn job_notice(&self, notice: JobNotice) {
        self.jobs.lock().unwrap().push(notice);
    }
}
