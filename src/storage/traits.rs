//! Storage traits and error types
//!
//! This module defines the capability interface every record store backend
//! implements, the batch unit it persists and the associated error types.

use crate::crawler::Retryable;
use crate::models::Record;
use rusqlite::ErrorCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown storage backend: {0}")]
    UnknownBackend(String),
}

impl Retryable for StorageError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Io(e) => e.is_retryable(),
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            }
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One atomic unit of persistence
///
/// `records` are appended to the record log. The ids of all records plus
/// `processed_ids` (threads handled without producing a record) are merged
/// into the seen-id set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub records: Vec<Record>,
    #[serde(default)]
    pub processed_ids: Vec<String>,
}

impl Batch {
    pub fn new(records: Vec<Record>, processed_ids: Vec<String>) -> Self {
        Self {
            records,
            processed_ids,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.processed_ids.is_empty()
    }

    /// Every id this batch marks as seen
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .map(|record| record.id.as_str())
            .chain(self.processed_ids.iter().map(String::as_str))
    }
}

/// Durable owner of the record log and the seen-id set
///
/// `save_batch` is atomic with respect to a process crash: after it returns
/// `Ok`, every record and id of the batch is visible to later loads; if the
/// process dies during the call, later loads see either none or all of it.
pub trait RecordStore: Send {
    /// Ids of every thread processed so far
    fn load_seen_ids(&self) -> StorageResult<HashSet<String>>;

    /// The record log in insertion order
    fn load_records(&self) -> StorageResult<Vec<Record>>;

    /// Persists a batch; an empty batch is a no-op
    fn save_batch(&mut self, batch: &Batch) -> StorageResult<()>;

    /// Appends records and marks their ids seen
    fn save_records(&mut self, records: &[Record]) -> StorageResult<()> {
        self.save_batch(&Batch::new(records.to_vec(), Vec::new()))
    }

    /// Marks ids seen without adding records
    fn mark_processed(&mut self, ids: &[String]) -> StorageResult<()> {
        self.save_batch(&Batch::new(Vec::new(), ids.to_vec()))
    }

    /// Deletes every record and seen id; irreversible
    fn clear(&mut self) -> StorageResult<()>;

    fn count_records(&self) -> StorageResult<usize>;

    fn count_seen_ids(&self) -> StorageResult<usize> {
        Ok(self.load_seen_ids()?.len())
    }

    /// Number of records per category name
    fn category_counts(&self) -> StorageResult<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for record in self.load_records()? {
            for category in record.categories {
                *counts.entry(category).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// Short description of where the data lives, for logs
    fn location(&self) -> String;
}
