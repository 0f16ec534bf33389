//! Error types for logbridge.
//!
//! All errors are strongly typed using thiserror. Only initialization-time
//! failures reach callers in steady state; poll-cycle failures are logged and
//! the loop keeps running.

use std::io;

use thiserror::Error;

/// Validation errors raised while normalizing configuration or filters.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Invalid filter expression '{expression}': {reason}")]
    InvalidFilter {
        expression: String,
        reason: String,
    },
}

/// Failures of the log store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient failure while querying; the poll cycle is skipped.
    #[error("Log store query failed: {message}")]
    Query {
        message: String,
    },

    /// The store cannot be opened at all. Fatal to initialization.
    #[error("Log store unavailable: {reason} (hint: {remediation})")]
    Unavailable {
        reason: String,
        remediation: String,
    },
}

impl StoreError {
    /// Creates a transient query error.
    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Creates an unavailable-store error with a remediation hint.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>, remediation: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            remediation: remediation.into(),
        }
    }
}

/// Failures of a checkpoint store.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Checkpoint record corrupted: {reason}")]
    Corrupted {
        reason: String,
    },

    #[error("Checkpoint directory is locked by another process: {path}")]
    Locked {
        path: String,
    },

    #[error("Checkpoint backend error: {0}")]
    Backend(String),
}

/// Error reported by a sink that could not accept an entry.
///
/// The dispatcher logs and swallows these.
#[derive(Debug, Error)]
#[error("Sink '{sink_id}' rejected entry: {message}")]
pub struct SinkError {
    pub sink_id: String,
    pub message: String,
}

impl SinkError {
    #[must_use]
    pub fn new(sink_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sink_id: sink_id.into(),
            message: message.into(),
        }
    }
}

/// Top-level error type for logbridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Log bridge is already initialized")]
    AlreadyInitialized,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl BridgeError {
    /// Returns true if this error was raised while initializing the bridge.
    #[must_use]
    pub const fn is_initialization(&self) -> bool {
        match self {
            Self::AlreadyInitialized | Self::Validation(_) => true,
            Self::Store(e) => matches!(e, StoreError::Unavailable { .. }),
            Self::Checkpoint(e) => matches!(e, CheckpointError::Locked { .. }),
        }
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::AlreadyInitialized | Self::Validation(_) => false,
            Self::Store(e) => matches!(e, StoreError::Query { .. }),
            Self::Checkpoint(e) => matches!(e, CheckpointError::Io(_) | CheckpointError::Locked { .. }),
        }
    }
}

/// Result type alias for logbridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_carries_remediation() {
        let err = StoreError::unavailable("no such file", "create the log file first");
        let msg = err.to_string();
        assert!(msg.contains("no such file"));
        assert!(msg.contains("create the log file first"));
    }

    #[test]
    fn test_bridge_error_from_store() {
        let err: BridgeError = StoreError::unavailable("gone", "retry later").into();
        assert!(err.is_initialization());
        assert!(!err.is_retryable());

        let err: BridgeError = StoreError::query("timeout").into();
        assert!(!err.is_initialization());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_already_initialized() {
        let err = BridgeError::AlreadyInitialized;
        assert!(err.is_initialization());
        assert!(err.to_string().contains("already initialized"));
    }

    #[test]
    fn test_checkpoint_locked_is_retryable() {
        let err: BridgeError = CheckpointError::Locked {
            path: "/tmp/x".to_string(),
        }
        .into();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("/tmp/x"));
    }

    #[test]
    fn test_sink_error_display() {
        let err = SinkError::new("console", "closed");
        let msg = format!("{err}");
        assert!(msg.contains("console"));
        assert!(msg.contains("closed"));
    }
}
