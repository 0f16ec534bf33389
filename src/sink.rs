//! Subscriber ("driver") surface.
//!
//! A sink is owned by its caller; the registry only holds a shared handle.
//! Sinks may synchronize internally (e.g. hand entries to their own queue),
//! so `receive` takes `&self`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use uuid::Uuid;

use crate::entry::LogEntry;
use crate::error::SinkError;
use crate::filter::LogSource;

/// A registered consumer of filtered log entries.
pub trait LogSink: Send + Sync {
    /// Stable identifier, unique within a registry.
    fn id(&self) -> &str;

    /// Sources this sink wants. Empty means every entry.
    fn sources(&self) -> Vec<LogSource>;

    /// Receives one entry that passed this sink's sources.
    ///
    /// # Errors
    ///
    /// Failures are logged by the dispatcher and never abort a batch.
    fn receive(&self, entry: &LogEntry) -> Result<(), SinkError>;
}

/// Ordered, deduplicated, mutable list of sources for a sink.
#[derive(Debug, Default)]
pub struct SinkFilters {
    sources: RwLock<Vec<LogSource>>,
}

impl SinkFilters {
    /// Creates an empty list (accept all).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a list from `sources`, dropping duplicates.
    #[must_use]
    pub fn from_sources(sources: impl IntoIterator<Item = LogSource>) -> Self {
        let filters = Self::new();
        for s in sources {
            filters.add(s);
        }
        filters
    }

    /// Appends `source` unless an equal one is present. Returns true if added.
    pub fn add(&self, source: LogSource) -> bool {
        let mut guard = self.sources.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.contains(&source) {
            return false;
        }
        guard.push(source);
        true
    }

    /// Removes `source`. Returns true if it was present.
    pub fn remove(&self, source: &LogSource) -> bool {
        let mut guard = self.sources.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|s| s != source);
        guard.len() != before
    }

    /// Removes every source (back to accept-all).
    pub fn clear(&self) {
        self.sources
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    /// Current sources in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogSource> {
        self.sources
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

/// Sink that queues accepted entries on a bounded channel.
///
/// The consumer side is a `SinkStream`. `receive` never blocks; when the
/// queue is full the entry is dropped and counted.
#[derive(Debug)]
pub struct ChannelSink {
    id: String,
    filters: SinkFilters,
    tx: Sender<LogEntry>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Creates a sink and its stream.
    #[must_use]
    pub fn new(id: impl Into<String>, capacity: usize) -> (Self, SinkStream) {
        let (tx, rx) = bounded::<LogEntry>(capacity.max(1));
        let sink = Self {
            id: id.into(),
            filters: SinkFilters::new(),
            tx,
            dropped: AtomicU64::new(0),
        };
        (sink, SinkStream { rx })
    }

    /// Creates a sink with a random id.
    #[must_use]
    pub fn anonymous(capacity: usize) -> (Self, SinkStream) {
        Self::new(format!("channel-{}", Uuid::new_v4()), capacity)
    }

    /// Mutable source list.
    #[must_use]
    pub fn filters(&self) -> &SinkFilters {
        &self.filters
    }

    /// Entries dropped because the queue was full or the stream was gone.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl LogSink for ChannelSink {
    fn id(&self) -> &str {
        &self.id
    }

    fn sources(&self) -> Vec<LogSource> {
        self.filters.snapshot()
    }

    fn receive(&self, entry: &LogEntry) -> Result<(), SinkError> {
        match self.tx.try_send(entry.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(SinkError::new(&self.id, "queue full"))
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(SinkError::new(&self.id, "stream dropped"))
            }
        }
    }
}

/// Consumer side of a `ChannelSink`.
#[derive(Debug)]
pub struct SinkStream {
    rx: Receiver<LogEntry>,
}

impl SinkStream {
    /// Receives the next entry with a timeout.
    ///
    /// # Errors
    ///
    /// `Timeout` if nothing arrived, `Disconnected` once the sink is dropped
    /// and drained.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<LogEntry, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Drains whatever is queued right now.
    #[must_use]
    pub fn drain(&self) -> Vec<LogEntry> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LogLevel;
    use chrono::Utc;

    #[test]
    fn filters_deduplicate_and_keep_order() {
        let f = SinkFilters::new();
        assert!(f.add(LogSource::subsystem("b")));
        assert!(f.add(LogSource::subsystem("a")));
        assert!(!f.add(LogSource::subsystem("B")));
        assert_eq!(
            f.snapshot(),
            vec![LogSource::subsystem("b"), LogSource::subsystem("a")]
        );

        assert!(f.remove(&LogSource::subsystem("b")));
        assert!(!f.remove(&LogSource::subsystem("b")));
        f.clear();
        assert!(f.snapshot().is_empty());
    }

    #[test]
    fn channel_sink_reports_full_queue() {
        let (sink, stream) = ChannelSink::new("c", 1);
        let entry = LogEntry::new(Utc::now(), "s", "c", LogLevel::Info, "m");

        sink.receive(&entry).unwrap();
        let err = sink.receive(&entry).unwrap_err();
        assert!(err.to_string().contains("queue full"));
        assert_eq!(sink.dropped(), 1);

        assert_eq!(stream.drain().len(), 1);
    }

    #[test]
    fn channel_sink_reports_dropped_stream() {
        let (sink, stream) = ChannelSink::anonymous(4);
        assert!(sink.id().starts_with("channel-"));
        drop(stream);

        let entry = LogEntry::new(Utc::now(), "s", "c", LogLevel::Info, "m");
        assert!(sink.receive(&entry).is_err());
    }
}
