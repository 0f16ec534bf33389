//! Filter matching used to route entries to sinks.

/// Composable id-keyed predicates.
pub mod expression;
/// Subscriber-level sources.
pub mod source;

pub use expression::{FilterExpression, SubsystemFilter};
pub use source::{accepts, LogSource};
