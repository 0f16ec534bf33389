//! Checkpoint storage: the instant through which entries were delivered.

mod memory;
#[cfg(feature = "persistent")]
pub mod persistent;
mod traits;

pub use memory::InMemoryCheckpointStore;
#[cfg(feature = "persistent")]
pub use persistent::FileCheckpointStore;
pub use traits::CheckpointStore;
