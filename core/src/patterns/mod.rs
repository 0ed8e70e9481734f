//! Line classification.
//!
//! A [`PatternRegistry`] is an ordered list of `(EventType, matcher)` rules.
//! The first rule that matches a line decides its event type.

pub mod builtin;
mod registry;

pub use builtin::default_registry;
pub use registry::{Fields, LineMatcher, PatternRegistry, PatternRegistryBuilder, PatternRule, RegexMatcher};
