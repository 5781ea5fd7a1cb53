//! Record Store Implementations
//!
//! A `RecordStore` holds named string records. `MemoryStore` backs tests
//! and ephemeral runs; `FileStore` keeps one JSON file per record under
//! the configured data directory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Error types for record persistence
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying I/O failure
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// Record could not be serialized
    #[error("Storage serialization error: {0}")]
    Serialize(String),

    /// Record name is not usable as a storage key
    #[error("Invalid record name: {0}")]
    InvalidName(String),
}

/// Storage for named string records.
///
/// Implementations must tolerate concurrent access; callers rely on
/// `put` being atomic per record (a reader never observes a half-written
/// value).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record by name. `Ok(None)` if it does not exist.
    async fn get(&self, name: &str) -> Result<Option<String>, StorageError>;

    /// Write a record, replacing any previous value in one step.
    async fn put(&self, name: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a record. Removing a missing record is not an error.
    async fn remove(&self, name: &str) -> Result<(), StorageError>;
}

/// In-memory record store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, name: &str) -> Result<Option<String>, StorageError> {
        let records = self.records.read().await;
        Ok(records.get(name).cloned())
    }

    async fn put(&self, name: &str, value: &str) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        records.insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        records.remove(name);
        Ok(())
    }
}

/// File-backed record store
///
/// Each record lives in `<base_dir>/<name>.json`. Writes go through a
/// temporary file followed by a rename so a crash mid-write leaves the
/// previous value intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)
            .map_err(|e| StorageError::Io(format!("create {}: {}", base_dir.display(), e)))?;
        Ok(Self { base_dir })
    }

    /// Directory this store writes into
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn record_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        // Record names double as file names; reject anything that could
        // escape the base directory.
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.base_dir.join(format!("{name}.json")))
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn get(&self, name: &str) -> Result<Option<String>, StorageError> {
        let path = self.record_path(name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(format!("read {}: {}", path.display(), e))),
        }
    }

    async fn put(&self, name: &str, value: &str) -> Result<(), StorageError> {
        let path = self.record_path(name)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| StorageError::Io(format!("write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::Io(format!("rename {}: {}", path.display(), e)))?;
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        let path = self.record_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(format!(
                "remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
