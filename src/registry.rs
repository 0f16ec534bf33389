//! Registry of subscribed sinks.
//!
//! Membership is keyed strictly by sink id and kept in insertion order. The
//! registry is not synchronized itself; the poll engine owns it behind its
//! exclusive-access boundary.

use std::sync::Arc;

use crate::sink::LogSink;

/// Outcome of `register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Added; the registry was empty before.
    AddedFirst,
    /// Added to a non-empty registry.
    Added,
    /// A sink with the same id was already present; nothing changed.
    Duplicate,
}

impl Registration {
    /// Returns true if the registry went from empty to non-empty.
    #[must_use]
    pub const fn became_non_empty(self) -> bool {
        matches!(self, Self::AddedFirst)
    }
}

/// Outcome of `deregister`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deregistration {
    /// Removed the last sink.
    RemovedLast,
    /// Removed; others remain.
    Removed,
    /// No sink had that id.
    NotFound,
}

impl Deregistration {
    /// Returns true if the registry became empty.
    #[must_use]
    pub const fn became_empty(self) -> bool {
        matches!(self, Self::RemovedLast)
    }
}

/// Canonical set of currently subscribed sinks.
#[derive(Default)]
pub struct SubscriberRegistry {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `sink` unless its id is already registered.
    pub fn register(&mut self, sink: Arc<dyn LogSink>) -> Registration {
        if self.is_registered(sink.id()) {
            tracing::warn!(sink_id = sink.id(), "sink already registered; ignoring");
            return Registration::Duplicate;
        }
        let was_empty = self.sinks.is_empty();
        tracing::debug!(sink_id = sink.id(), "sink registered");
        self.sinks.push(sink);
        if was_empty {
            Registration::AddedFirst
        } else {
            Registration::Added
        }
    }

    /// Removes the sink with `id`, if any.
    pub fn deregister(&mut self, id: &str) -> Deregistration {
        let Some(pos) = self.sinks.iter().position(|s| s.id() == id) else {
            return Deregistration::NotFound;
        };
        self.sinks.remove(pos);
        tracing::debug!(sink_id = id, "sink deregistered");
        if self.sinks.is_empty() {
            Deregistration::RemovedLast
        } else {
            Deregistration::Removed
        }
    }

    /// Returns true if a sink with `id` is registered.
    #[must_use]
    pub fn is_registered(&self, id: &str) -> bool {
        self.sinks.iter().any(|s| s.id() == id)
    }

    /// Shared handles in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<dyn LogSink>> {
        self.sinks.clone()
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true if no sink is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.sinks.iter().map(|s| s.id())).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;

    fn sink(id: &str) -> Arc<dyn LogSink> {
        Arc::new(ChannelSink::new(id, 8).0)
    }

    #[test]
    fn duplicate_registration_is_noop() {
        let mut reg = SubscriberRegistry::new();
        assert_eq!(reg.register(sink("a")), Registration::AddedFirst);
        assert_eq!(reg.register(sink("a")), Registration::Duplicate);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn reports_emptiness_transitions() {
        let mut reg = SubscriberRegistry::new();
        assert!(reg.register(sink("a")).became_non_empty());
        assert!(!reg.register(sink("b")).became_non_empty());

        assert_eq!(reg.deregister("a"), Deregistration::Removed);
        assert_eq!(reg.deregister("a"), Deregistration::NotFound);
        assert!(reg.deregister("b").became_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn snapshot_keeps_insertion_order() {
        let mut reg = SubscriberRegistry::new();
        for id in ["c", "a", "b"] {
            reg.register(sink(id));
        }
        let ids: Vec<String> = reg.snapshot().iter().map(|s| s.id().to_string()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert!(reg.is_registered("a"));
        assert!(!reg.is_registered("z"));
    }
}
