//! Error types for each pipeline concern.

use std::path::PathBuf;
use std::time::Duration;

use sclm_types::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TailError {
    #[error("log file {path} is inaccessible after {attempts} attempts: {source}")]
    Inaccessible {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid pattern for {event_type}: {source}")]
    InvalidRegex {
        event_type: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("pattern for {event_type} declares field '{field}' but has no capture group for it")]
    MissingCapture {
        event_type: &'static str,
        field: String,
    },
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[source] confy::ConfyError),

    #[error("failed to save config: {0}")]
    Save(#[source] confy::ConfyError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache file is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to start {name} sink: {reason}")]
    Start { name: String, reason: String },

    #[error("{name} sink thread exited before reporting readiness")]
    Vanished { name: String },
}
