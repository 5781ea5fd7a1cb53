//! Download Controller
//!
//! Downloads charge their own resource class through the same tracker as
//! generations, with the same policy: admission before the fetch, charge
//! only after the bytes are safely on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::quota::{ResourceClass, UsageTracker, WindowScope};

use super::notify::{NotificationSink, UsageNotice};

/// Error types for downloads
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Admission control rejected the download
    #[error("{scope} download quota exceeded")]
    QuotaExceeded { scope: WindowScope },

    /// The fetch failed
    #[error("Network error: {0}")]
    Network(String),

    /// Writing the file failed
    #[error("I/O error: {0}")]
    Io(String),
}

/// A completed download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Bytes written to disk
    pub bytes_written: u64,

    /// Destination path
    pub path: PathBuf,

    /// Downloads left in today's window after this one
    pub remaining_today: u32,
}

/// Fetches result images under the download quota
pub struct DownloadController {
    tracker: Arc<UsageTracker>,
    sink: Arc<dyn NotificationSink>,
    client: reqwest::Client,
}

impl DownloadController {
    /// Create a controller over the given tracker and sink
    pub fn new(tracker: Arc<UsageTracker>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            tracker,
            sink,
            client: reqwest::Client::new(),
        }
    }

    /// Download `url` to `dest`, charging the download quota on success
    pub async fn download(&self, url: &str, dest: &Path) -> Result<DownloadOutcome, DownloadError> {
        let class = ResourceClass::Download;
        if !self.tracker.check_limit(class).await {
            let usage = self.tracker.usage(class).await;
            let scope = if usage.daily.remaining == 0 {
                WindowScope::Daily
            } else {
                WindowScope::Monthly
            };
            self.sink
                .usage_notice(UsageNotice::LimitReached { class, scope })
                .await;
            return Err(DownloadError::QuotaExceeded { scope });
        }

        if self.tracker.is_near_limit(class).await {
            let usage = self.tracker.usage(class).await;
            self.sink
                .usage_notice(UsageNotice::NearLimit {
                    class,
                    remaining_today: usage.daily.remaining,
                })
                .await;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DownloadError::Network(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::Network(e.to_string()))?;

        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| DownloadError::Io(format!("{}: {}", dest.display(), e)))?;

        // Charge only now that the file exists
        self.tracker.track(class).await;
        let usage = self.tracker.usage(class).await;
        info!(
            "Downloaded {} bytes to {} ({} left today)",
            bytes.len(),
            dest.display(),
            usage.daily.remaining
        );

        Ok(DownloadOutcome {
            bytes_written: bytes.len() as u64,
            path: dest.to_path_buf(),
            remaining_today: usage.daily.remaining,
        })
    }
}
