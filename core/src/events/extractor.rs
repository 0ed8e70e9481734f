use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::trace;

use super::event::{Event, Record, UnmatchedLine};
use crate::error::TailError;
use crate::log::{LogLine, TailStatus, Tailer};
use crate::patterns::{Fields, PatternRegistry};

/// Field that carries the game's own timestamp.
const TIMESTAMP_FIELD: &str = "timestamp";

/// Turns log lines into records. Holds no per-line state.
#[derive(Clone)]
pub struct Extractor {
    registry: Arc<PatternRegistry>,
}

impl Extractor {
    pub fn new(registry: Arc<PatternRegistry>) -> Self {
        Self { registry }
    }

    pub fn extract(&self, line: LogLine) -> Record {
        match self.registry.classify(&line.text) {
            Some((event_type, fields)) => {
                let timestamp = embedded_timestamp(&fields).unwrap_or(line.read_at);
                Record::Event(Arc::new(Event {
                    event_type,
                    timestamp,
                    raw_line: line.text,
                    fields,
                    organizations: BTreeMap::new(),
                }))
            }
            None => Record::Unmatched(Arc::new(UnmatchedLine { line })),
        }
    }
}

/// Parse the embedded timestamp when it is a well-formed RFC 3339 instant.
fn embedded_timestamp(fields: &Fields) -> Option<DateTime<Utc>> {
    let raw = fields.get(TIMESTAMP_FIELD)?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Item produced by [`RecordStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    Record(Record),
    Status(TailStatus),
}

/// Pull-based sequence of records read from a tailer.
///
/// Never ends on its own; only a fatal [`TailError`] stops it.
pub struct RecordStream {
    tailer: Tailer,
    extractor: Extractor,
    pending: VecDeque<Ingested>,
}

impl RecordStream {
    pub fn new(tailer: Tailer, extractor: Extractor) -> Self {
        Self {
            tailer,
            extractor,
            pending: VecDeque::new(),
        }
    }

    pub async fn next(&mut self) -> Result<Ingested, TailError> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Ok(item);
            }

            let lines = self.tailer.poll().await?;
            self.pending
                .extend(self.tailer.take_status().into_iter().map(Ingested::Status));
            for line in lines {
                trace!(offset = line.offset, "Extracting line");
                self.pending
                    .push_back(Ingested::Record(self.extractor.extract(line)));
            }
        }
    }

    pub fn tailer(&self) -> &Tailer {
        &self.tailer
    }
}
