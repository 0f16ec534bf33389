//! Log entry types read from the host log store.
//!
//! Entries are produced by the store and are immutable once produced; this
//! crate never persists them.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Error,
    Fault,
    /// Level the store could not classify.
    Undefined,
}

impl LogLevel {
    /// Returns the canonical lowercase representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Error => "error",
            Self::Fault => "fault",
            Self::Undefined => "undefined",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured argument attached to a rendered message.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogComponent {
    Text { value: String },
    SignedInt { value: i64 },
    UnsignedInt { value: u64 },
    Float { value: f64 },
    Data { bytes: Vec<u8> },
    /// Argument redacted by the producing process.
    Private,
}

/// A single entry read from the log store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was written.
    pub timestamp: DateTime<Utc>,
    /// Emitting subsystem (namespace).
    pub subsystem: String,
    /// Category within the subsystem.
    pub category: String,
    /// Severity.
    pub level: LogLevel,
    /// Fully rendered message.
    pub message: String,
    /// Structured arguments, when the store exposes them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<LogComponent>,
}

impl LogEntry {
    /// Creates an entry without structured components.
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        subsystem: impl Into<String>,
        category: impl Into<String>,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            subsystem: subsystem.into(),
            category: category.into(),
            level,
            message: message.into(),
            components: Vec::new(),
        }
    }

    /// Attaches structured components.
    #[must_use]
    pub fn with_components(mut self, components: Vec<LogComponent>) -> Self {
        self.components = components;
        self
    }

    /// Orders entries by timestamp only.
    #[must_use]
    pub fn cmp_timestamp(&self, other: &Self) -> Ordering {
        self.timestamp.cmp(&other.timestamp)
    }
}

/// Sorts a batch ascending by timestamp.
///
/// Stable: entries sharing a timestamp keep the store's relative order.
pub fn sort_batch(entries: &mut [LogEntry]) {
    entries.sort_by(LogEntry::cmp_timestamp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn sort_is_stable_on_equal_timestamps() {
        let t0 = Utc::now();
        let mut batch = vec![
            LogEntry::new(t0 + Duration::seconds(1), "s", "c", LogLevel::Info, "late"),
            LogEntry::new(t0, "s", "c", LogLevel::Info, "first"),
            LogEntry::new(t0, "s", "c", LogLevel::Info, "second"),
        ];
        sort_batch(&mut batch);
        let messages: Vec<&str> = batch.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "late"]);
    }

    #[test]
    fn entry_serializes_without_empty_components() {
        let entry = LogEntry::new(Utc::now(), "sys", "cat", LogLevel::Error, "boom");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("components"));

        let parsed: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn level_display() {
        assert_eq!(LogLevel::Fault.to_string(), "fault");
    }
}
