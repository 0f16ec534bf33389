//! Composable string predicates identified by a canonical id.
//!
//! Every comparison is case-insensitive: stored operands are lowered at
//! construction and the probed value is lowered at evaluation time.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::error::ValidationError;

type PredicateFn = dyn Fn(&str) -> bool + Send + Sync;

#[derive(Clone)]
enum Kind {
    Exact(String),
    Prefix(String),
    Contains(String),
    Regex(Regex),
    Not(Box<FilterExpression>),
    All(Vec<FilterExpression>),
    Any(Vec<FilterExpression>),
    Predicate(Arc<PredicateFn>),
}

/// An immutable predicate over a single string field.
///
/// Two expressions are equal iff their ids are equal. Ids are built from the
/// ids of nested expressions, so they stay reconstructable through
/// composition, e.g. `not(exact(cat-ui))`. Delimiters inside operands are
/// backslash-escaped. `predicate` ids are taken verbatim.
#[derive(Clone)]
pub struct FilterExpression {
    id: String,
    kind: Kind,
}

impl FilterExpression {
    /// Matches values equal to `value`.
    #[must_use]
    pub fn exact(value: &str) -> Self {
        let value = value.to_lowercase();
        Self {
            id: format!("exact({})", escape_operand(&value)),
            kind: Kind::Exact(value),
        }
    }

    /// Matches values starting with `prefix`.
    #[must_use]
    pub fn prefix(prefix: &str) -> Self {
        let prefix = prefix.to_lowercase();
        Self {
            id: format!("prefix({})", escape_operand(&prefix)),
            kind: Kind::Prefix(prefix),
        }
    }

    /// Matches values containing `needle`.
    #[must_use]
    pub fn contains(needle: &str) -> Self {
        let needle = needle.to_lowercase();
        Self {
            id: format!("contains({})", escape_operand(&needle)),
            kind: Kind::Contains(needle),
        }
    }

    /// Matches values against a regular expression, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidFilter` if the pattern does not compile.
    pub fn regex(pattern: &str) -> Result<Self, ValidationError> {
        let compiled = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ValidationError::InvalidFilter {
                expression: pattern.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            id: format!("regex({})", escape_operand(pattern)),
            kind: Kind::Regex(compiled),
        })
    }

    /// Inverts `inner`.
    #[must_use]
    pub fn not(inner: Self) -> Self {
        Self {
            id: format!("not({})", inner.id),
            kind: Kind::Not(Box::new(inner)),
        }
    }

    /// Matches when every member matches. An empty list matches everything.
    #[must_use]
    pub fn all_of(members: Vec<Self>) -> Self {
        Self {
            id: format!("all({})", join_ids(&members)),
            kind: Kind::All(members),
        }
    }

    /// Matches when any member matches. An empty list matches nothing.
    #[must_use]
    pub fn any_of(members: Vec<Self>) -> Self {
        Self {
            id: format!("any({})", join_ids(&members)),
            kind: Kind::Any(members),
        }
    }

    /// Wraps an arbitrary predicate under a caller-chosen id.
    ///
    /// The predicate receives the lowered value.
    #[must_use]
    pub fn predicate<F>(id: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            kind: Kind::Predicate(Arc::new(f)),
        }
    }

    /// Canonical id used for equality and deduplication.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Evaluates the expression against `value`.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        self.matches_lowered(&value.to_lowercase())
    }

    pub(crate) fn matches_lowered(&self, value: &str) -> bool {
        match &self.kind {
            Kind::Exact(v) => value == v,
            Kind::Prefix(p) => value.starts_with(p.as_str()),
            Kind::Contains(n) => value.contains(n.as_str()),
            Kind::Regex(re) => re.is_match(value),
            Kind::Not(inner) => !inner.matches_lowered(value),
            Kind::All(members) => members.iter().all(|m| m.matches_lowered(value)),
            Kind::Any(members) => members.iter().any(|m| m.matches_lowered(value)),
            Kind::Predicate(f) => f(value),
        }
    }
}

/// Backslash-escapes the id delimiters so operands cannot forge structure.
fn escape_operand(operand: &str) -> String {
    let mut out = String::with_capacity(operand.len());
    for c in operand.chars() {
        if matches!(c, '\\' | '(' | ')' | ',' | ';') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn join_ids(members: &[FilterExpression]) -> String {
    members
        .iter()
        .map(FilterExpression::id)
        .collect::<Vec<_>>()
        .join(",")
}

impl PartialEq for FilterExpression {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FilterExpression {}

impl Hash for FilterExpression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FilterExpression").field(&self.id).finish()
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// A subsystem filter with an optional category constraint.
///
/// Categories are evaluated only after the subsystem matched, and stop at the
/// first matching category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubsystemFilter {
    id: String,
    subsystem: FilterExpression,
    categories: Option<Vec<FilterExpression>>,
}

impl SubsystemFilter {
    /// Builds a composite filter. `None` means any category.
    #[must_use]
    pub fn new(subsystem: FilterExpression, categories: Option<Vec<FilterExpression>>) -> Self {
        let id = match &categories {
            None => format!("subsystem({})", subsystem.id()),
            Some(cats) => format!("subsystem({};{})", subsystem.id(), join_ids(cats)),
        };
        Self {
            id,
            subsystem,
            categories,
        }
    }

    /// Canonical id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Evaluates the filter against an entry's subsystem and category.
    #[must_use]
    pub fn matches(&self, subsystem: &str, category: &str) -> bool {
        if !self.subsystem.matches(subsystem) {
            return false;
        }
        match &self.categories {
            None => true,
            Some(cats) => {
                let category = category.to_lowercase();
                cats.iter().any(|c| c.matches_lowered(&category))
            }
        }
    }
}
