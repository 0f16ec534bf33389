//! Log store contract.

use chrono::{DateTime, Utc};

use crate::entry::LogEntry;
use crate::error::StoreError;

/// Read-only access to the host's append-only log.
///
/// Implementations return entries strictly newer than `after` (or every
/// entry when `after` is `None`) in the store's own order. The caller sorts.
pub trait LogStore: Send + Sync {
    /// Queries entries newer than the exclusive lower bound.
    ///
    /// # Errors
    ///
    /// `StoreError::Query` on a transient access failure.
    fn query(&self, after: Option<DateTime<Utc>>) -> Result<Vec<LogEntry>, StoreError>;
}
