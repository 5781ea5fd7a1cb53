//! Session Orchestration
//!
//! The generation session controller composes admission control,
//! submission, polling, and the post-success quota charge into one flow;
//! the download controller does the same for result downloads. Both
//! signal through the notification sink instead of rendering anything.

pub mod controller;
pub mod download;
pub mod history;
pub mod notify;

pub use controller::{GenerationOutcome, SessionConfig, SessionController, SessionError};
pub use download::{DownloadController, DownloadError, DownloadOutcome};
pub use history::{GenerationHistory, GenerationRecord};
pub use notify::{JobNotice, NotificationSink, RecordingSink, TracingSink, UsageNotice};
