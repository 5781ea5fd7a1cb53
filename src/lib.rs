//! Pictor Client Library
//!
//! This library provides the core functionality for the Pictor client:
//! submitting jobs to a remote image-generation service, polling them to
//! completion with cooperative cancellation, and enforcing rolling
//! daily/monthly usage quotas resolved from the user's subscription plan.

pub mod api;
pub mod clock;
pub mod config;
pub mod job;
pub mod quota;
pub mod session;
pub mod storage;

pub use api::{GenerationApi, GenerationOptions, HttpGenerationClient, JobRequest};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use job::{CancellationToken, GenerationJob, JobOutcome, JobState, PollLoop};
pub use quota::{
    LimitResolver, PlanId, QuotaLimits, ResourceClass, UsageTracker, WindowScope,
};
pub use session::{
    DownloadController, GenerationOutcome, SessionConfig, SessionController, SessionError,
};
pub use storage::{FileStore, MemoryStore, RecordStore};
