//! Log store collaborators.
//!
//! The host log is treated as an opaque, append-only service. Implementations
//! are provided for process memory and JSON-lines files.

mod jsonl;
mod memory;
mod traits;

pub use jsonl::JsonLinesLogStore;
pub use memory::InMemoryLogStore;
pub use traits::LogStore;
