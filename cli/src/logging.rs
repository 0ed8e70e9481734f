//! Diagnostics setup. Stdout belongs to the console sink, so logs go to a file.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

/// Overrides the log destination with a single append-only file.
pub const LOG_PATH_ENV: &str = "SCLM_LOG_PATH";

const LOG_FILE_PREFIX: &str = "sc-log-monitor.log";

/// Directory holding the daily log files.
pub fn default_log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("sc-log-monitor").join("logs"))
}

/// Install the global subscriber.
///
/// The returned guard flushes buffered lines when dropped and must be kept
/// alive until the process exits. `None` means logs go to stderr only.
pub fn init_logging(debug: bool) -> Option<WorkerGuard> {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    let (writer, guard) = match file_writer() {
        Some((non_blocking, guard)) => {
            let writer = if debug {
                BoxMakeWriter::new(non_blocking.and(std::io::stderr))
            } else {
                BoxMakeWriter::new(non_blocking)
            };
            (writer, Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer)
        .init();

    guard
}

fn file_writer() -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    // If SCLM_LOG_PATH is set, append to that file
    if let Ok(path) = std::env::var(LOG_PATH_ENV) {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            Ok(file) => return Some(tracing_appender::non_blocking(file)),
            Err(e) => eprintln!("cannot open {LOG_PATH_ENV}={path}: {e}"),
        }
    }

    let dir = default_log_dir()?;
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("cannot create log directory {}: {e}", dir.display());
        return None;
    }
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    Some(tracing_appender::non_blocking(appender))
}
