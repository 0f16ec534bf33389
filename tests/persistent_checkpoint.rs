#![cfg(feature = "persistent")]

use std::path::Path;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};

use logbridge::{
    BridgeConfig, BridgeError, ChannelSink, CheckpointError, CheckpointStrategy, InMemoryLogStore,
    LogBridge, LogEntry, LogLevel, LogStore,
};

fn persistent_config(store: &Arc<InMemoryLogStore>, dir: &Path, key: &str) -> BridgeConfig {
    BridgeConfig {
        store: Some(Arc::clone(store) as Arc<dyn LogStore>),
        checkpoint: CheckpointStrategy::Persistent {
            dir: dir.to_path_buf(),
            key: key.to_string(),
            sync_on_write: true,
        },
        ..BridgeConfig::default()
    }
}

#[test]
fn checkpoint_survives_bridge_recreation() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryLogStore::new());
    let t0 = Utc::now();
    store
        .append(LogEntry::new(t0, "app", "net", LogLevel::Info, "before restart"))
        .unwrap();

    {
        let bridge = LogBridge::new();
        bridge.initialize(persistent_config(&store, dir.path(), "console")).unwrap();
        let (sink, stream) = ChannelSink::new("console", 8);
        bridge.register_driver(Arc::new(sink));

        bridge.poll_immediately(None);
        assert_eq!(stream.drain().len(), 1);
        assert_eq!(bridge.last_processed_date(), Some(t0));
    }

    store
        .append(LogEntry::new(
            t0 + ChronoDuration::seconds(1),
            "app",
            "net",
            LogLevel::Info,
            "after restart",
        ))
        .unwrap();

    let bridge = LogBridge::new();
    bridge.initialize(persistent_config(&store, dir.path(), "console")).unwrap();
    assert_eq!(bridge.last_processed_date(), Some(t0));

    let (sink, stream) = ChannelSink::new("console", 8);
    bridge.register_driver(Arc::new(sink));
    let report = bridge.poll_immediately(None);
    assert_eq!(report.lower_bound, Some(t0));

    let messages: Vec<String> = stream.drain().into_iter().map(|e| e.message).collect();
    assert_eq!(messages, vec!["after restart"]);
}

#[test]
fn keys_do_not_share_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryLogStore::new());
    store
        .append(LogEntry::new(Utc::now(), "app", "net", LogLevel::Info, "x"))
        .unwrap();

    let first = LogBridge::new();
    first.initialize(persistent_config(&store, dir.path(), "one")).unwrap();
    first.poll_immediately(None);
    assert!(first.last_processed_date().is_some());

    let second = LogBridge::new();
    second.initialize(persistent_config(&store, dir.path(), "two")).unwrap();
    assert_eq!(second.last_processed_date(), None);
}

#[test]
fn same_key_cannot_be_opened_twice() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryLogStore::new());

    let first = LogBridge::new();
    first.initialize(persistent_config(&store, dir.path(), "shared")).unwrap();

    let second = LogBridge::new();
    let err = second
        .initialize(persistent_config(&store, dir.path(), "shared"))
        .unwrap_err();
    assert!(matches!(err, BridgeError::Checkpoint(CheckpointError::Locked { .. })));
    assert!(err.is_retryable());
    assert!(!second.is_initialized());
}
