use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::EventType;

/// Where the game writes its log on a default installation.
pub const DEFAULT_LOG_FILE_PATH: &str =
    r"C:\Program Files\Roberts Space Industries\StarCitizen\LIVE\Game.log";

pub const MIN_FONT_SIZE: u32 = 6;
pub const MAX_FONT_SIZE: u32 = 96;

// ─────────────────────────────────────────────────────────────────────────────
// Monitor configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Static configuration consumed by the monitor pipeline.
///
/// Loaded from the persisted TOML file, then overridden by command line flags.
/// Missing keys fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub log_file_path: PathBuf,
    /// Resolve player handles to organization SIDs.
    pub fetch_organizations: bool,
    /// Show lines that matched no pattern.
    pub show_raw_lines: bool,
    /// Event types shown in the console. Empty accepts every type.
    pub event_filter: Vec<EventType>,
    pub overlay: OverlaySettings,
    pub tailing: TailSettings,
    pub enrichment: EnrichmentSettings,
    /// Per-sink delivery queue bound.
    pub sink_queue_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_file_path: PathBuf::from(DEFAULT_LOG_FILE_PATH),
            fetch_organizations: true,
            show_raw_lines: false,
            event_filter: Vec::new(),
            overlay: OverlaySettings::default(),
            tailing: TailSettings::default(),
            enrichment: EnrichmentSettings::default(),
            sink_queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    pub enabled: bool,
    /// Overlay event types. `None` inherits the console filter.
    pub event_filter: Option<Vec<EventType>>,
    pub lines: usize,
    pub display: usize,
    pub font_size: u32,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            event_filter: None,
            lines: 3,
            display: 0,
            font_size: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TailSettings {
    pub poll_interval_ms: u64,
    /// Wait between attempts while the log file does not exist yet.
    pub open_retry_ms: u64,
    /// Attempts before an inaccessible (but existing) path becomes fatal.
    pub startup_retries: u32,
}

impl Default for TailSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            open_retry_ms: 1000,
            startup_retries: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    pub lookup_timeout_ms: u64,
    pub persist_org_cache: bool,
    pub org_cache_ttl_days: u32,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: 5000,
            persist_org_cache: true,
            org_cache_ttl_days: 72,
        }
    }
}

impl MonitorConfig {
    /// Overlay filter after falling back to the console filter.
    pub fn overlay_event_filter(&self) -> &[EventType] {
        self.overlay
            .event_filter
            .as_deref()
            .unwrap_or(&self.event_filter)
    }

    /// Check invariants the pipeline relies on.
    ///
    /// Returns every violation, not just the first.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut problems = Vec::new();

        if self.log_file_path.as_os_str().is_empty() {
            problems.push("log file path is empty".to_string());
        }
        if self.overlay.lines == 0 {
            problems.push("overlay line count must be at least 1".to_string());
        }
        if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&self.overlay.font_size) {
            problems.push(format!(
                "overlay font size {} is outside {}..={}",
                self.overlay.font_size, MIN_FONT_SIZE, MAX_FONT_SIZE
            ));
        }
        if self.tailing.poll_interval_ms == 0 {
            problems.push("poll interval must be greater than 0 ms".to_string());
        }
        if self.sink_queue_capacity == 0 {
            problems.push("sink queue capacity must be at least 1".to_string());
        }
        if self.enrichment.lookup_timeout_ms == 0 {
            problems.push("lookup timeout must be greater than 0 ms".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { problems })
        }
    }
}

/// One or more configuration invariants were violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub problems: Vec<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration: {}", self.problems.join("; "))
    }
}

impl std::error::Error for ValidationError {}
