use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use sclm_types::EventType;

use crate::error::PatternError;

/// Named values extracted from a matched line.
pub type Fields = BTreeMap<String, String>;

/// Extracts fields from a line, or rejects it.
pub trait LineMatcher: Send + Sync {
    fn match_line(&self, line: &str) -> Option<Fields>;
}

impl<F> LineMatcher for F
where
    F: Fn(&str) -> Option<Fields> + Send + Sync,
{
    fn match_line(&self, line: &str) -> Option<Fields> {
        self(line)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Regex matcher
// ─────────────────────────────────────────────────────────────────────────────

/// Matches with a regular expression and returns its named captures.
///
/// Declared fields must be present and non-empty, otherwise the line is
/// rejected. Other named captures are copied when they participated.
pub struct RegexMatcher {
    regex: Regex,
    required: Vec<String>,
}

impl RegexMatcher {
    pub fn new(
        event_type: EventType,
        pattern: &str,
        required: &[&str],
    ) -> Result<Self, PatternError> {
        let regex = Regex::new(pattern).map_err(|source| PatternError::InvalidRegex {
            event_type: event_type.as_str(),
            source,
        })?;

        let names: Vec<&str> = regex.capture_names().flatten().collect();
        if let Some(missing) = required.iter().find(|field| !names.contains(field)) {
            return Err(PatternError::MissingCapture {
                event_type: event_type.as_str(),
                field: missing.to_string(),
            });
        }

        Ok(Self {
            regex,
            required: required.iter().map(|f| f.to_string()).collect(),
        })
    }
}

impl LineMatcher for RegexMatcher {
    fn match_line(&self, line: &str) -> Option<Fields> {
        let caps = self.regex.captures(line)?;

        let mut fields = Fields::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(value) = caps.name(name) {
                fields.insert(name.to_string(), value.as_str().to_string());
            }
        }

        let complete = self
            .required
            .iter()
            .all(|name| fields.get(name).is_some_and(|v| !v.is_empty()));
        complete.then_some(fields)
    }
}

impl fmt::Debug for RegexMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexMatcher")
            .field("pattern", &self.regex.as_str())
            .field("required", &self.required)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

pub struct PatternRule {
    pub event_type: EventType,
    matcher: Box<dyn LineMatcher>,
}

#[derive(Default)]
pub struct PatternRegistryBuilder {
    rules: Vec<PatternRule>,
}

impl PatternRegistryBuilder {
    /// Append a rule. Rules registered earlier win ties.
    pub fn register(mut self, event_type: EventType, matcher: impl LineMatcher + 'static) -> Self {
        self.rules.push(PatternRule {
            event_type,
            matcher: Box::new(matcher),
        });
        self
    }

    pub fn build(self) -> PatternRegistry {
        PatternRegistry { rules: self.rules }
    }
}

/// Immutable, ordered rule set.
pub struct PatternRegistry {
    rules: Vec<PatternRule>,
}

impl PatternRegistry {
    pub fn builder() -> PatternRegistryBuilder {
        PatternRegistryBuilder::default()
    }

    /// Classify a line with the first matching rule.
    pub fn classify(&self, line: &str) -> Option<(EventType, Fields)> {
        self.rules.iter().find_map(|rule| {
            rule.matcher
                .match_line(line)
                .map(|fields| (rule.event_type, fields))
        })
    }

    /// Event types in registration order.
    pub fn event_types(&self) -> impl Iterator<Item = EventType> + '_ {
        self.rules.iter().map(|rule| rule.event_type)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
