use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use logbridge::{
    BridgeConfig, BridgeError, ChannelSink, InMemoryLogStore, LogBridge, LogEntry, LogLevel,
    LogSink, LogSource, PollState, StoreError,
};

fn memory_config(store: &Arc<InMemoryLogStore>) -> BridgeConfig {
    BridgeConfig {
        store: Some(Arc::clone(store) as Arc<dyn logbridge::LogStore>),
        ..BridgeConfig::default()
    }
}

#[test]
fn second_initialize_is_rejected() {
    let bridge = LogBridge::new();
    let store = Arc::new(InMemoryLogStore::new());
    bridge.initialize(memory_config(&store)).unwrap();
    assert!(bridge.is_initialized());

    let err = bridge.initialize(memory_config(&store)).unwrap_err();
    assert!(matches!(err, BridgeError::AlreadyInitialized));
    assert!(err.is_initialization());
    assert!(!err.is_retryable());
}

#[test]
fn unavailable_log_file_leaves_bridge_uninitialized() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.jsonl");

    let bridge = LogBridge::new();
    let err = bridge
        .initialize(BridgeConfig {
            log_path: Some(missing.clone()),
            ..BridgeConfig::default()
        })
        .unwrap_err();
    match &err {
        BridgeError::Store(StoreError::Unavailable { remediation, .. }) => {
            assert!(!remediation.is_empty());
        }
        other => panic!("expected unavailable store, got {other:?}"),
    }
    assert!(err.is_initialization());
    assert!(!bridge.is_initialized());

    File::create(&missing).unwrap();
    bridge
        .initialize(BridgeConfig {
            log_path: Some(missing),
            ..BridgeConfig::default()
        })
        .unwrap();
    assert!(bridge.is_initialized());
}

#[test]
fn json_lines_file_feeds_drivers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("host.jsonl");
    let t0 = Utc::now();
    {
        let mut file = File::create(&path).unwrap();
        for (i, (subsystem, message)) in [("com.example.net", "connected"), ("com.example.ui", "drawn")]
            .iter()
            .enumerate()
        {
            let entry = LogEntry::new(
                t0 + ChronoDuration::seconds(i as i64),
                *subsystem,
                "default",
                LogLevel::Info,
                *message,
            );
            writeln!(file, "{}", serde_json::to_string(&entry).unwrap()).unwrap();
        }
        writeln!(file, "not json").unwrap();
    }

    let bridge = LogBridge::new();
    bridge
        .initialize(BridgeConfig {
            log_path: Some(path),
            ..BridgeConfig::default()
        })
        .unwrap();

    let (sink, stream) = ChannelSink::new("net", 16);
    sink.filters().add(LogSource::subsystem("com.example.net"));
    bridge.register_driver(Arc::new(sink));

    let report = bridge.poll_immediately(None);
    assert_eq!(report.fetched, 2);
    let messages: Vec<String> = stream.drain().into_iter().map(|e| e.message).collect();
    assert_eq!(messages, vec!["connected"]);
    assert_eq!(bridge.last_processed_date(), Some(t0 + ChronoDuration::seconds(1)));
}

#[test]
fn facade_pauses_and_resumes_with_drivers() {
    let bridge = LogBridge::new();
    let store = Arc::new(InMemoryLogStore::new());
    bridge
        .initialize(BridgeConfig {
            polling_interval: Duration::from_secs(60),
            ..memory_config(&store)
        })
        .unwrap();
    assert!(bridge.should_pause_if_no_registered_drivers());

    bridge.start_polling();
    assert!(bridge.is_enabled());
    assert_eq!(bridge.state(), PollState::RunningPaused);

    let (sink, _stream) = ChannelSink::new("a", 4);
    bridge.register_driver(Arc::new(sink));
    assert!(bridge.is_driver_registered("a"));
    assert_eq!(bridge.state(), PollState::Running);

    bridge.deregister_driver("a");
    assert!(bridge.is_enabled());
    assert_eq!(bridge.state(), PollState::RunningPaused);

    bridge.set_should_pause_if_no_registered_drivers(false);
    assert_eq!(bridge.state(), PollState::Running);

    bridge.stop_polling();
    assert!(!bridge.is_enabled());
    assert_eq!(bridge.state(), PollState::Stopped);
}

#[test]
fn register_drivers_adds_each_once() {
    let bridge = LogBridge::new();
    let store = Arc::new(InMemoryLogStore::new());
    bridge.initialize(memory_config(&store)).unwrap();

    let drivers: Vec<Arc<dyn LogSink>> = ["a", "b", "a"]
        .iter()
        .map(|id| Arc::new(ChannelSink::new(*id, 4).0) as Arc<dyn LogSink>)
        .collect();
    bridge.register_drivers(drivers);

    assert!(bridge.is_driver_registered("a"));
    assert!(bridge.is_driver_registered("b"));
    bridge.deregister_driver("a");
    assert!(!bridge.is_driver_registered("a"));
}

#[test]
fn interval_below_minimum_is_raised() {
    let bridge = LogBridge::new();
    let store = Arc::new(InMemoryLogStore::new());
    bridge
        .initialize(BridgeConfig {
            polling_interval: Duration::from_millis(10),
            ..memory_config(&store)
        })
        .unwrap();
    assert_eq!(bridge.polling_interval(), Duration::from_secs(1));

    bridge.set_polling_interval(Duration::from_secs(5));
    assert_eq!(bridge.polling_interval(), Duration::from_secs(5));
    bridge.set_polling_interval(Duration::ZERO);
    assert_eq!(bridge.polling_interval(), Duration::from_secs(1));
}
