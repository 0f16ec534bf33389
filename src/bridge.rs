//! Externally visible entry point.
//!
//! `LogBridge` composes a log store, a checkpoint store and the poll engine.
//! It is initialized exactly once; every other operation before that is a
//! contract violation and panics.
//!
//! # Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use logbridge::{BridgeConfig, ChannelSink, LogBridge, LogSource};
//!
//! let bridge = LogBridge::shared();
//! bridge.initialize(BridgeConfig {
//!     log_path: Some("/var/log/app.jsonl".into()),
//!     ..BridgeConfig::default()
//! })?;
//!
//! let (sink, stream) = ChannelSink::new("console", 1024);
//! sink.filters().add(LogSource::subsystem("com.example.net"));
//! bridge.register_driver(Arc::new(sink));
//! bridge.start_polling();
//! ```

use std::fmt;
#[cfg(feature = "persistent")]
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::checkpoint::{CheckpointStore, InMemoryCheckpointStore};
#[cfg(feature = "persistent")]
use crate::checkpoint::FileCheckpointStore;
use crate::engine::{clamp_interval, EngineConfig, PollEngine, PollReport, PollState, MIN_POLLING_INTERVAL};
use crate::error::{BridgeError, BridgeResult, StoreError, ValidationError};
use crate::sink::LogSink;
use crate::store::{JsonLinesLogStore, LogStore};

/// Where the checkpoint lives.
#[derive(Clone, Default)]
pub enum CheckpointStrategy {
    /// Process memory; every run starts from scratch.
    #[default]
    InMemory,
    /// Durable file store, keyed by `key` inside `dir`.
    #[cfg(feature = "persistent")]
    Persistent {
        /// Directory holding checkpoint files.
        dir: PathBuf,
        /// Caller-chosen key (one checkpoint per key).
        key: String,
        /// fsync every write.
        sync_on_write: bool,
    },
    /// Caller-provided store.
    Custom(Arc<dyn CheckpointStore>),
}

impl fmt::Debug for CheckpointStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InMemory => f.write_str("InMemory"),
            #[cfg(feature = "persistent")]
            Self::Persistent { dir, key, sync_on_write } => f
                .debug_struct("Persistent")
                .field("dir", dir)
                .field("key", key)
                .field("sync_on_write", sync_on_write)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Bridge configuration.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Time between scheduled polls (clamped to at least one second).
    pub polling_interval: Duration,
    /// Checkpoint persistence.
    pub checkpoint: CheckpointStrategy,
    /// Suspend scheduled polling while no driver is registered.
    pub pause_if_no_drivers: bool,
    /// Log store override. Takes precedence over `log_path`.
    pub store: Option<Arc<dyn LogStore>>,
    /// JSON-lines log file used when no override is given.
    pub log_path: Option<std::path::PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            polling_interval: MIN_POLLING_INTERVAL,
            checkpoint: CheckpointStrategy::InMemory,
            pause_if_no_drivers: true,
            store: None,
            log_path: None,
        }
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("polling_interval", &self.polling_interval)
            .field("checkpoint", &self.checkpoint)
            .field("pause_if_no_drivers", &self.pause_if_no_drivers)
            .field("store", &self.store.as_ref().map(|_| ".."))
            .field("log_path", &self.log_path)
            .finish()
    }
}

impl BridgeConfig {
    /// Normalizes the configuration.
    ///
    /// # Errors
    ///
    /// `ValidationError::MissingField` if a persistent checkpoint has an
    /// empty key.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.polling_interval = clamp_interval(self.polling_interval);

        #[cfg(feature = "persistent")]
        let missing_key = matches!(
            &self.checkpoint,
            CheckpointStrategy::Persistent { key, .. } if key.trim().is_empty()
        );
        #[cfg(not(feature = "persistent"))]
        let missing_key = false;

        if missing_key {
            return Err(ValidationError::MissingField {
                field: "checkpoint.key".to_string(),
            });
        }
        Ok(self)
    }

    fn open_store(&mut self) -> Result<Arc<dyn LogStore>, StoreError> {
        if let Some(store) = self.store.take() {
            return Ok(store);
        }
        match &self.log_path {
            Some(path) => Ok(Arc::new(JsonLinesLogStore::open(path)?)),
            None => Err(StoreError::unavailable(
                "no log store configured",
                "set BridgeConfig::store or BridgeConfig::log_path",
            )),
        }
    }

    fn open_checkpoints(&self) -> BridgeResult<Arc<dyn CheckpointStore>> {
        Ok(match &self.checkpoint {
            CheckpointStrategy::InMemory => Arc::new(InMemoryCheckpointStore::new()),
            #[cfg(feature = "persistent")]
            CheckpointStrategy::Persistent { dir, key, sync_on_write } => {
                Arc::new(FileCheckpointStore::open(dir, key, *sync_on_write)?)
            }
            CheckpointStrategy::Custom(store) => Arc::clone(store),
        })
    }
}

/// The log bridge facade.
///
/// Construct one at startup (or use `LogBridge::shared()`), call
/// `initialize` once, and hand references to consumers. Dropping the bridge
/// cancels scheduled polling.
#[derive(Default)]
pub struct LogBridge {
    engine: OnceLock<PollEngine>,
    init: Mutex<()>,
}

impl LogBridge {
    /// Creates an uninitialized bridge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide instance, created uninitialized on first use.
    pub fn shared() -> &'static Self {
        static SHARED: OnceLock<LogBridge> = OnceLock::new();
        SHARED.get_or_init(Self::new)
    }

    /// Opens the stores and builds the engine (stopped).
    ///
    /// # Errors
    /// - `AlreadyInitialized` on a second call
    /// - `Store(Unavailable)` if the log store cannot be opened
    /// - `Checkpoint` if the checkpoint store cannot be opened
    /// - `Validation` for invalid configuration
    ///
    /// On error the bridge stays uninitialized.
    pub fn initialize(&self, config: BridgeConfig) -> BridgeResult<()> {
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if self.engine.get().is_some() {
            return Err(BridgeError::AlreadyInitialized);
        }

        let mut config = config.validate()?;
        let store = config.open_store()?;
        let checkpoints = config.open_checkpoints()?;
        let engine = PollEngine::new(
            store,
            checkpoints,
            EngineConfig {
                polling_interval: config.polling_interval,
                pause_if_empty: config.pause_if_no_drivers,
            },
        );

        self.engine
            .set(engine)
            .map_err(|_| BridgeError::AlreadyInitialized)?;

        tracing::info!(
            interval_ms = config.polling_interval.as_millis() as u64,
            checkpoint = ?config.checkpoint,
            pause_if_no_drivers = config.pause_if_no_drivers,
            "log bridge initialized"
        );
        Ok(())
    }

    /// Returns true once `initialize` succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.engine.get().is_some()
    }

    fn engine(&self) -> &PollEngine {
        match self.engine.get() {
            Some(engine) => engine,
            None => panic!("LogBridge used before initialize(); initialize it once at startup"),
        }
    }

    /// See [`PollEngine::start`].
    pub fn start_polling(&self) {
        self.engine().start();
    }

    /// See [`PollEngine::stop`].
    pub fn stop_polling(&self) {
        self.engine().stop();
    }

    /// See [`PollEngine::set_polling_interval`].
    pub fn set_polling_interval(&self, interval: Duration) {
        self.engine().set_polling_interval(interval);
    }

    /// See [`PollEngine::poll_immediately`].
    pub fn poll_immediately(&self, from: Option<DateTime<Utc>>) -> PollReport {
        self.engine().poll_immediately(from)
    }

    /// See [`PollEngine::register_driver`].
    pub fn register_driver(&self, driver: Arc<dyn LogSink>) {
        self.engine().register_driver(driver);
    }

    /// See [`PollEngine::register_drivers`].
    pub fn register_drivers(&self, drivers: impl IntoIterator<Item = Arc<dyn LogSink>>) {
        self.engine().register_drivers(drivers);
    }

    /// See [`PollEngine::deregister_driver`].
    pub fn deregister_driver(&self, id: &str) {
        self.engine().deregister_driver(id);
    }

    /// See [`PollEngine::is_driver_registered`].
    #[must_use]
    pub fn is_driver_registered(&self, id: &str) -> bool {
        self.engine().is_driver_registered(id)
    }

    /// See [`PollEngine::set_pause_if_empty`].
    pub fn set_should_pause_if_no_registered_drivers(&self, pause: bool) {
        self.engine().set_pause_if_empty(pause);
    }

    /// Whether polling is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.engine().is_enabled()
    }

    /// Effective polling interval.
    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        self.engine().polling_interval()
    }

    /// Current checkpoint.
    #[must_use]
    pub fn last_processed_date(&self) -> Option<DateTime<Utc>> {
        self.engine().last_processed()
    }

    /// Current pause policy.
    #[must_use]
    pub fn should_pause_if_no_registered_drivers(&self) -> bool {
        self.engine().pause_if_empty()
    }

    /// Engine state.
    #[must_use]
    pub fn state(&self) -> PollState {
        self.engine().state()
    }
}

impl fmt::Debug for LogBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogBridge").field("engine", &self.engine.get()).finish()
    }
}
