//! Named-Record Persistence
//!
//! The client persists a small set of named string-valued records (usage
//! counters, subscription, generation history). This module provides the
//! store abstraction plus in-memory and on-disk implementations, and the
//! version-tag helpers shared by every persisted record.

pub mod record;
pub mod store;

pub use record::{load_record, save_record};
pub use store::{FileStore, MemoryStore, RecordStore, StorageError};
