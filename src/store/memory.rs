//! In-memory append-only log store.
//!
//! Intended for embedded usage, tests, and as a reference implementation.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::entry::LogEntry;
use crate::error::StoreError;

use super::traits::LogStore;

/// Append-only store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    entries: RwLock<Vec<LogEntry>>,
}

impl InMemoryLogStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// `StoreError::Query` if the store lock is poisoned.
    pub fn append(&self, entry: LogEntry) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(|_| StoreError::query("poisoned lock: log append"))?
            .push(entry);
        Ok(())
    }

    /// Appends a batch in order.
    ///
    /// # Errors
    ///
    /// `StoreError::Query` if the store lock is poisoned.
    pub fn extend(&self, entries: impl IntoIterator<Item = LogEntry>) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(|_| StoreError::query("poisoned lock: log append"))?
            .extend(entries);
        Ok(())
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|g| g.len()).unwrap_or(0)
    }

    /// Returns true if nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogStore for InMemoryLogStore {
    fn query(&self, after: Option<DateTime<Utc>>) -> Result<Vec<LogEntry>, StoreError> {
        let guard = self
            .entries
            .read()
            .map_err(|_| StoreError::query("poisoned lock: log query"))?;
        Ok(guard
            .iter()
            .filter(|e| after.map_or(true, |bound| e.timestamp > bound))
            .cloned()
            .collect())
    }
}
