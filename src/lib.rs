//! # logbridge - Log polling bridge
//!
//! logbridge periodically pulls newly written entries out of a host log
//! store and fans them out to registered sinks. Each sink declares which
//! subsystems and categories it wants; a checkpoint records the newest
//! delivered timestamp so every entry is handed to a sink at most once per
//! checkpoint advance.
//!
//! ## Core Concepts
//!
//! - **LogEntry**: One record read from the host log
//! - **LogSource**: A subsystem plus optional category filter a sink subscribes to
//! - **LogSink**: A subscriber that receives matching entries in timestamp order
//! - **Checkpoint**: The instant through which entries were delivered
//! - **PollEngine**: The scheduling state machine (stopped, running, paused)
//! - **LogBridge**: The initialize-once facade over all of the above
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use logbridge::{BridgeConfig, ChannelSink, InMemoryLogStore, LogBridge, LogSource};
//!
//! let bridge = LogBridge::new();
//! bridge.initialize(BridgeConfig {
//!     store: Some(Arc::new(InMemoryLogStore::new())),
//!     ..BridgeConfig::default()
//! })?;
//!
//! let (sink, stream) = ChannelSink::new("net", 256);
//! sink.filters().add(LogSource::subsystem_categories("com.example.net", ["http"]));
//! bridge.register_driver(Arc::new(sink));
//! bridge.start_polling();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod entry;
pub mod error;
pub mod filter;

// Collaborators
pub mod checkpoint;
pub mod sink;
pub mod store;

// Polling
pub mod dispatcher;
pub mod engine;
pub mod registry;

// Facade
pub mod bridge;

// Re-export primary types at crate root for convenience
pub use bridge::{BridgeConfig, CheckpointStrategy, LogBridge};
#[cfg(feature = "persistent")]
pub use checkpoint::FileCheckpointStore;
pub use checkpoint::{CheckpointStore, InMemoryCheckpointStore};
pub use dispatcher::{dispatch, DispatchReport};
pub use engine::{
    clamp_interval, EngineConfig, PollEngine, PollOutcome, PollReport, PollState,
    MIN_POLLING_INTERVAL,
};
pub use entry::{LogComponent, LogEntry, LogLevel};
pub use error::{
    BridgeError, BridgeResult, CheckpointError, SinkError, StoreError, ValidationError,
};
pub use filter::{FilterExpression, LogSource, SubsystemFilter};
pub use registry::{Deregistration, Registration, SubscriberRegistry};
pub use sink::{ChannelSink, LogSink, SinkFilters, SinkStream};
pub use store::{InMemoryLogStore, JsonLinesLogStore, LogStore};
