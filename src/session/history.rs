//! Generation History
//!
//! A bounded, persisted ring of completed generations. Purely
//! informational; losing it never blocks a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::{load_record, save_record, RecordStore};

/// Version tag for the persisted history record
pub const HISTORY_RECORD_VERSION: u32 = 1;

/// Name of the persisted history record
pub const HISTORY_RECORD: &str = "generation_history";

/// Maximum entries kept
pub const HISTORY_RING_CAPACITY: usize = 50;

/// One completed generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Local session id
    pub id: String,

    /// Remote job id
    pub job_id: String,

    /// Prompt length in characters (the prompt itself is not persisted)
    pub prompt_chars: usize,

    /// Result URLs returned by the service
    pub urls: Vec<String>,

    /// When the job succeeded
    pub completed_at: DateTime<Utc>,
}

/// Persisted ring of completed generations, most recent first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationHistory {
    /// Record format version
    pub version: u32,

    /// Entries, most recent first, bounded by [`HISTORY_RING_CAPACITY`]
    pub entries: Vec<GenerationRecord>,
}

impl GenerationHistory {
    fn empty() -> Self {
        Self {
            version: HISTORY_RECORD_VERSION,
            entries: Vec::new(),
        }
    }

    /// Load the history, fail-open to empty
    pub async fn load(store: &dyn RecordStore) -> Self {
        load_record(store, HISTORY_RECORD, HISTORY_RECORD_VERSION)
            .await
            .unwrap_or_else(Self::empty)
    }

    /// Prepend a record and persist the ring.
    ///
    /// A failed write is logged and swallowed; history is best-effort.
    pub async fn append(store: &dyn RecordStore, record: GenerationRecord) {
        let mut history = Self::load(store).await;
        history.entries.insert(0, record);
        history.entries.truncate(HISTORY_RING_CAPACITY);
        if let Err(e) = save_record(store, HISTORY_RECORD, &history).await {
            warn!("Failed to persist generation history: {}", e);
        }
    }
}
