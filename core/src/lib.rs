pub mod context;
pub mod dispatch;
pub mod enrichment;
pub mod error;
pub mod events;
pub mod log;
pub mod patterns;
pub mod render;

// Re-exports for convenience
pub use dispatch::{Delivery, Dispatcher, Sink, SinkFilter};
pub use events::{Event, Notice, Record, UnmatchedLine};
pub use log::{LogLine, Tailer};
pub use patterns::{PatternRegistry, default_registry};
pub use sclm_types::{EventType, MonitorConfig};
