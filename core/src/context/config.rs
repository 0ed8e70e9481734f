//! Persisted configuration.

use std::path::{Path, PathBuf};

use sclm_types::MonitorConfig;
use tracing::{info, warn};

use crate::dispatch::SinkFilter;
use crate::error::ConfigError;

/// Name under which confy stores the configuration file.
pub const APP_NAME: &str = "sc-log-monitor";

/// Load the saved configuration, falling back to defaults if it is unreadable.
pub fn load_config() -> MonitorConfig {
    match confy::load::<MonitorConfig>(APP_NAME, None) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            MonitorConfig::default()
        }
    }
}

/// Load a configuration file named on the command line. Failure is fatal.
pub fn load_config_from(path: &Path) -> Result<MonitorConfig, ConfigError> {
    let config: MonitorConfig = confy::load_path(path).map_err(ConfigError::Load)?;
    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Persist `config` after validating it.
pub fn save_config(config: &MonitorConfig) -> Result<(), ConfigError> {
    config.validate()?;
    confy::store(APP_NAME, None, config).map_err(ConfigError::Save)?;
    if let Some(path) = config_file_path() {
        info!(path = %path.display(), "Saved configuration");
    }
    Ok(())
}

/// Persist `config` at an explicit path after validating it.
pub fn save_config_to(path: &Path, config: &MonitorConfig) -> Result<(), ConfigError> {
    config.validate()?;
    confy::store_path(path, config).map_err(ConfigError::Save)?;
    info!(path = %path.display(), "Saved configuration");
    Ok(())
}

pub fn config_file_path() -> Option<PathBuf> {
    confy::get_configuration_file_path(APP_NAME, None).ok()
}

/// Filter for the scrolling console.
pub fn console_filter(config: &MonitorConfig) -> SinkFilter {
    SinkFilter::only(config.event_filter.iter().copied()).with_unmatched(config.show_raw_lines)
}

/// Filter for the overlay, inheriting the console types when unset.
pub fn overlay_filter(config: &MonitorConfig) -> SinkFilter {
    SinkFilter::only(config.overlay_event_filter().iter().copied())
        .with_unmatched(config.show_raw_lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sclm_types::EventType;

    #[test]
    fn test_overlay_filter_is_independent() {
        let mut config = MonitorConfig::default();
        config.event_filter = vec![EventType::ActorDeath, EventType::VehicleDestruction];
        config.overlay.event_filter = Some(vec![EventType::VehicleDestruction]);

        let console = console_filter(&config);
        let overlay = overlay_filter(&config);

        assert!(console.accepts_type(EventType::ActorDeath));
        assert!(console.accepts_type(EventType::VehicleDestruction));
        assert!(!overlay.accepts_type(EventType::ActorDeath));
        assert!(overlay.accepts_type(EventType::VehicleDestruction));
    }

    #[test]
    fn test_raw_visibility_follows_config() {
        let mut config = MonitorConfig::default();
        config.show_raw_lines = true;
        assert!(console_filter(&config).shows_unmatched());
        config.show_raw_lines = false;
        assert!(!overlay_filter(&config).shows_unmatched());
    }

    #[test]
    fn test_load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        std::fs::write(&path, "show_raw_lines = true\n[overlay]\nlines = 7\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert!(config.show_raw_lines);
        assert_eq!(config.overlay.lines, 7);
    }

    #[test]
    fn test_load_from_malformed_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        std::fs::write(&path, "overlay = 12\n").unwrap();
        assert!(matches!(load_config_from(&path), Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_save_to_path_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        let mut config = MonitorConfig::default();
        config.overlay.font_size = 22;
        config.event_filter = vec![EventType::ActorDeath];

        save_config_to(&path, &config).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_save_rejects_invalid_config() {
        let mut config = MonitorConfig::default();
        config.overlay.lines = 0;
        assert!(matches!(save_config(&config), Err(ConfigError::Invalid(_))));
    }
}
