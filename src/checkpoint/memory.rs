//! Process-memory checkpoint store.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::error::CheckpointError;

use super::traits::CheckpointStore;

fn lock_err(context: &'static str) -> CheckpointError {
    CheckpointError::Backend(format!("poisoned lock: {context}"))
}

/// Volatile checkpoint; lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    value: RwLock<Option<DateTime<Utc>>>,
}

impl InMemoryCheckpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `checkpoint`.
    #[must_use]
    pub fn with_checkpoint(checkpoint: DateTime<Utc>) -> Self {
        Self {
            value: RwLock::new(Some(checkpoint)),
        }
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn read(&self) -> Result<Option<DateTime<Utc>>, CheckpointError> {
        let guard = self.value.read().map_err(|_| lock_err("checkpoint read"))?;
        Ok(*guard)
    }

    fn write(&self, checkpoint: Option<DateTime<Utc>>) -> Result<(), CheckpointError> {
        let mut guard = self.value.write().map_err(|_| lock_err("checkpoint write"))?;
        *guard = checkpoint;
        Ok(())
    }
}
