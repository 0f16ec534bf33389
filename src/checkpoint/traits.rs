//! Checkpoint storage contract.

use chrono::{DateTime, Utc};

use crate::error::CheckpointError;

/// Stores the instant through which all entries have been delivered.
///
/// # Safety Considerations
/// - Implementations must handle concurrent access safely
/// - `write(None)` clears the checkpoint
pub trait CheckpointStore: Send + Sync {
    /// Reads the current checkpoint.
    fn read(&self) -> Result<Option<DateTime<Utc>>, CheckpointError>;

    /// Replaces the current checkpoint.
    fn write(&self, checkpoint: Option<DateTime<Utc>>) -> Result<(), CheckpointError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure the trait is object-safe
    fn _assert_checkpoint_store_object_safe(_: &dyn CheckpointStore) {}
}
