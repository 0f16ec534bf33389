//! Subscriber-level log sources.

use std::collections::BTreeSet;
use std::fmt;

use super::expression::{FilterExpression, SubsystemFilter};

/// A log source a sink wants to receive.
///
/// Either a whole subsystem, or a subsystem restricted to a set of
/// categories. Names are lowered at construction, so sources that differ only
/// by case are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogSource {
    subsystem: String,
    categories: Option<BTreeSet<String>>,
    filter: SubsystemFilter,
}

impl LogSource {
    /// Every entry of `subsystem`.
    #[must_use]
    pub fn subsystem(subsystem: &str) -> Self {
        Self::build(subsystem, None)
    }

    /// Entries of `subsystem` whose category is one of `categories`.
    ///
    /// An empty category set matches nothing.
    #[must_use]
    pub fn subsystem_categories<I, S>(subsystem: &str, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = categories
            .into_iter()
            .map(|c| c.as_ref().to_lowercase())
            .collect::<BTreeSet<_>>();
        Self::build(subsystem, Some(set))
    }

    fn build(subsystem: &str, categories: Option<BTreeSet<String>>) -> Self {
        let subsystem = subsystem.to_lowercase();
        let filter = SubsystemFilter::new(
            FilterExpression::exact(&subsystem),
            categories
                .as_ref()
                .map(|set| set.iter().map(|c| FilterExpression::exact(c)).collect()),
        );
        Self {
            subsystem,
            categories,
            filter,
        }
    }

    /// Lowered subsystem name.
    #[must_use]
    pub fn subsystem_name(&self) -> &str {
        &self.subsystem
    }

    /// Lowered categories, or `None` when every category is accepted.
    #[must_use]
    pub fn categories(&self) -> Option<&BTreeSet<String>> {
        self.categories.as_ref()
    }

    /// Canonical id of the underlying filter.
    #[must_use]
    pub fn id(&self) -> &str {
        self.filter.id()
    }

    /// Returns true if an entry with this subsystem and category is wanted.
    #[must_use]
    pub fn matches(&self, subsystem: &str, category: &str) -> bool {
        self.filter.matches(subsystem, category)
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Applies a sink's source list: empty accepts all, otherwise any source
/// matching is enough.
#[must_use]
pub fn accepts(sources: &[LogSource], subsystem: &str, category: &str) -> bool {
    sources.is_empty() || sources.iter().any(|s| s.matches(subsystem, category))
}
