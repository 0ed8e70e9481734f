mod event;
mod extractor;

pub use event::{Event, Notice, Record, UnmatchedLine};
pub use extractor::{Extractor, Ingested, RecordStream};
