use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sclm_types::formatting::beautify_entity_name;
use sclm_types::{APPLICATION_NAME, APPLICATION_VERSION, EventType};

use crate::enrichment::{Affiliation, OrganizationInfo};
use crate::log::LogLine;
use crate::patterns::Fields;

/// A classified log line.
///
/// Built once by the extractor, optionally given organizations by the
/// enrichment stage, then shared read-only with every sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub raw_line: String,
    pub fields: Fields,
    /// Lookup results keyed by display handle. Empty when not enriched.
    pub organizations: BTreeMap<String, Affiliation>,
}

impl Event {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Player handles carried by this event, without instance suffixes.
    pub fn handles(&self) -> Vec<String> {
        let mut handles: Vec<String> = Vec::new();
        for name in self.event_type.handle_fields() {
            if let Some(raw) = self.field(name) {
                let handle = beautify_entity_name(raw);
                if !handles.iter().any(|h| h == handle) {
                    handles.push(handle.to_string());
                }
            }
        }
        handles
    }

    pub fn affiliation(&self, handle: &str) -> Option<&Affiliation> {
        self.organizations.get(handle)
    }

    pub fn organization(&self, handle: &str) -> Option<&OrganizationInfo> {
        self.affiliation(handle).and_then(Affiliation::organization)
    }

    /// Return a copy carrying the given lookup results.
    pub fn with_organizations(mut self, organizations: BTreeMap<String, Affiliation>) -> Self {
        self.organizations = organizations;
        self
    }
}

/// A line no pattern matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedLine {
    pub line: LogLine,
}

impl UnmatchedLine {
    pub fn text(&self) -> &str {
        &self.line.text
    }
}

/// What the extractor hands downstream for every line.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Event(Arc<Event>),
    Unmatched(Arc<UnmatchedLine>),
}

impl Record {
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            Record::Event(event) => Some(event.event_type),
            Record::Unmatched(_) => None,
        }
    }
}

/// Status messages shown by every sink regardless of its filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Banner,
    OverlayBanner,
    WaitingForFile(PathBuf),
    Restarting,
    Warning(String),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::Banner => format!("[ {} - {} ]", APPLICATION_NAME, APPLICATION_VERSION),
            Notice::OverlayBanner => {
                format!("[ {} - Overlay - {} ]", APPLICATION_NAME, APPLICATION_VERSION)
            }
            Notice::WaitingForFile(path) => {
                format!("[ Waiting for log file: {} ]", path.display())
            }
            Notice::Restarting => format!(
                "[ {} - {} - Restarting... ]",
                APPLICATION_NAME, APPLICATION_VERSION
            ),
            Notice::Warning(text) => format!("[ {} ]", text),
        }
    }
}
