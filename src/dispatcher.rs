//! Fan-out of a sorted batch to the registered sinks.
//!
//! Outer loop over entries, inner loop over sinks: every sink sees entry N
//! before any sink sees entry N+1. A failing sink never aborts the batch.

use std::sync::Arc;

use crate::entry::LogEntry;
use crate::filter::accepts;
use crate::sink::LogSink;

/// Counts from one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Successful `receive` calls.
    pub delivered: usize,
    /// `receive` calls that returned an error.
    pub failed: usize,
}

/// Delivers `entries` (already sorted) to `sinks` in snapshot order.
#[must_use]
pub fn dispatch(entries: &[LogEntry], sinks: &[Arc<dyn LogSink>]) -> DispatchReport {
    let mut report = DispatchReport::default();
    if entries.is_empty() || sinks.is_empty() {
        return report;
    }

    // Sources are read once per batch so a concurrent add/remove cannot split
    // a batch across two filter sets.
    let routes: Vec<_> = sinks.iter().map(|s| (s, s.sources())).collect();

    for entry in entries {
        for (sink, sources) in &routes {
            if !accepts(sources, &entry.subsystem, &entry.category) {
                continue;
            }
            match sink.receive(entry) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(sink_id = sink.id(), error = %e, "sink failed to receive entry");
                }
            }
        }
    }

    report
}
