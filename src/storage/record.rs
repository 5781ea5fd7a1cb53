//! Versioned Record Helpers
//!
//! Every persisted entity carries a `version` tag. Readers are fail-open:
//! a missing, corrupt, or version-incompatible record is treated as absent
//! (the caller falls back to its zero state) rather than surfacing an
//! error and blocking the feature.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::store::{RecordStore, StorageError};

/// Load a versioned record, fail-open.
///
/// Returns `None` when the record is missing, unreadable, unparseable, or
/// tagged with a version other than `expected_version`. Every fallback
/// path logs a warning so silent data loss is at least visible.
pub async fn load_record<T: DeserializeOwned>(
    store: &dyn RecordStore,
    name: &str,
    expected_version: u32,
) -> Option<T> {
    let raw = match store.get(name).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read record '{}', using defaults: {}", name, e);
            return None;
        }
    };

    let value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("Record '{}' is corrupt, using defaults: {}", name, e);
            return None;
        }
    };

    match value.get("version").and_then(|v| v.as_u64()) {
        Some(version) if version == u64::from(expected_version) => {}
        other => {
            warn!(
                "Record '{}' has incompatible version {:?} (expected {}), using defaults",
                name, other, expected_version
            );
            return None;
        }
    }

    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Record '{}' failed to decode, using defaults: {}", name, e);
            None
        }
    }
}

/// Serialize and persist a record in one write.
pub async fn save_record<T: Serialize>(
    store: &dyn RecordStore,
    name: &str,
    record: &T,
) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| StorageError::Serialize(e.to_string()))?;
    store.put(name, &json).await
}
