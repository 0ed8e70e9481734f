//! Shared configuration types for the Star Citizen log monitor.
//!
//! Everything here is plain data: the event catalogue, the monitor
//! configuration consumed by the core pipeline, and display formatting
//! helpers shared by the console and overlay sinks.

mod config;
mod event_type;
pub mod formatting;

pub use config::{
    DEFAULT_LOG_FILE_PATH, EnrichmentSettings, MAX_FONT_SIZE, MIN_FONT_SIZE, MonitorConfig,
    OverlaySettings, TailSettings, ValidationError,
};
pub use event_type::{EventType, UnknownEventType};

/// Application name shown in banners and window titles.
pub const APPLICATION_NAME: &str = "Star Citizen Log Monitor";

/// Application version shown in banners and window titles.
pub const APPLICATION_VERSION: &str = env!("CARGO_PKG_VERSION");
