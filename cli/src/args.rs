//! Command-line flags layered over the saved configuration.

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use sclm_core::context::{load_config, load_config_from};
use sclm_core::error::ConfigError;
use sclm_types::{DEFAULT_LOG_FILE_PATH, EventType, MonitorConfig};

#[derive(Parser, Debug, Default)]
#[command(
    name = "sc-log-monitor",
    version,
    about = "Follow Star Citizen's Game.log and show kills, deaths and session events"
)]
pub struct Args {
    #[arg(long, value_name = "PATH", help = format!("Log file path [default: {DEFAULT_LOG_FILE_PATH}]"))]
    pub log_file_path: Option<PathBuf>,

    /// Whether to look up player organizations on the RSI website
    #[arg(long, value_name = "BOOL", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub enable_organization_fetching: Option<bool>,

    /// Whether to hide lines that match no event
    #[arg(long, value_name = "BOOL", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub show_parsed_events_only: Option<bool>,

    /// Event type to include; repeat for several (default: all)
    #[arg(long = "event", value_name = "TYPE")]
    pub events: Vec<EventType>,

    /// Event type to include in the overlay; repeat for several (default: --event)
    #[arg(long = "overlay-event", value_name = "TYPE")]
    pub overlay_events: Vec<EventType>,

    /// Show the always-on-top overlay window
    #[arg(long)]
    pub overlay: bool,

    /// Number of lines shown in the overlay
    #[arg(long, value_name = "N")]
    pub overlay_lines: Option<usize>,

    /// Display index the overlay is placed on
    #[arg(long, value_name = "INDEX")]
    pub overlay_display: Option<usize>,

    /// Overlay font size in pixels
    #[arg(long, value_name = "PX")]
    pub overlay_font_size: Option<u32>,

    /// How often the log file is checked for new lines
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Read settings from this file instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the effective settings back to the config file
    #[arg(long)]
    pub save_config: bool,

    /// Mirror diagnostics to stderr
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Load the config file, apply the flags and validate the result.
    pub fn resolve_config(&self) -> Result<MonitorConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config_from(path)?,
            None => load_config(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Override every field that was given on the command line.
    pub fn apply(&self, config: &mut MonitorConfig) {
        if let Some(path) = &self.log_file_path {
            config.log_file_path = path.clone();
        }
        if let Some(fetch) = self.enable_organization_fetching {
            config.fetch_organizations = fetch;
        }
        if let Some(parsed_only) = self.show_parsed_events_only {
            config.show_raw_lines = !parsed_only;
        }
        if !self.events.is_empty() {
            config.event_filter = self.events.clone();
        }
        if !self.overlay_events.is_empty() {
            config.overlay.event_filter = Some(self.overlay_events.clone());
        }
        if self.overlay {
            config.overlay.enabled = true;
        }
        if let Some(lines) = self.overlay_lines {
            config.overlay.lines = lines;
        }
        if let Some(display) = self.overlay_display {
            config.overlay.display = display;
        }
        if let Some(font_size) = self.overlay_font_size {
            config.overlay.font_size = font_size;
        }
        if let Some(interval) = self.poll_interval_ms {
            config.tailing.poll_interval_ms = interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("sc-log-monitor").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_no_flags_keep_file_values() {
        let mut config = MonitorConfig::default();
        config.overlay.lines = 9;
        config.show_raw_lines = true;

        let expected = config.clone();
        parse(&[]).apply(&mut config);
        assert_eq!(config, expected);
    }

    #[test]
    fn test_flags_override_file_values() {
        let args = parse(&[
            "--log-file-path",
            "/tmp/Game.log",
            "--enable-organization-fetching",
            "false",
            "--show-parsed-events-only",
            "no",
            "--event",
            "actor-death",
            "--event",
            "Vehicle-Destruction",
            "--overlay-event",
            "vehicle-destruction",
            "--overlay",
            "--overlay-lines",
            "5",
            "--overlay-display",
            "1",
            "--overlay-font-size",
            "20",
            "--poll-interval-ms",
            "25",
        ]);

        let mut config = MonitorConfig::default();
        args.apply(&mut config);

        assert_eq!(config.log_file_path, PathBuf::from("/tmp/Game.log"));
        assert!(!config.fetch_organizations);
        assert!(config.show_raw_lines);
        assert_eq!(
            config.event_filter,
            vec![EventType::ActorDeath, EventType::VehicleDestruction]
        );
        assert_eq!(config.overlay_event_filter(), &[EventType::VehicleDestruction]);
        assert!(config.overlay.enabled);
        assert_eq!(config.overlay.lines, 5);
        assert_eq!(config.overlay.display, 1);
        assert_eq!(config.overlay.font_size, 20);
        assert_eq!(config.tailing.poll_interval_ms, 25);
    }

    #[test]
    fn test_overlay_filter_inherits_event_flags() {
        let mut config = MonitorConfig::default();
        parse(&["--event", "actor-stall"]).apply(&mut config);
        assert_eq!(config.overlay_event_filter(), &[EventType::ActorStall]);
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let result =
            Args::try_parse_from(["sc-log-monitor", "--event", "space-whale-sighting"]);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("space-whale-sighting"));
    }

    #[test]
    fn test_resolve_validates_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        std::fs::write(&path, "fetch_organizations = false\n").unwrap();

        let mut args = parse(&["--overlay-lines", "0"]);
        args.config = Some(path);
        assert!(matches!(args.resolve_config(), Err(ConfigError::Invalid(_))));

        args.overlay_lines = Some(4);
        let config = args.resolve_config().unwrap();
        assert!(!config.fetch_organizations);
        assert_eq!(config.overlay.lines, 4);
    }
}
