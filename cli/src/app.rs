//! Wires configuration, pipeline and sinks into one monitoring session.

use std::time::Duration;

use sclm_core::context::{Pipeline, console_filter, overlay_filter};
use sclm_core::enrichment::{RsiLookup, default_cache_path};
use sclm_core::error::{ConfigError, PatternError, SinkError, TailError};
use sclm_core::{Delivery, Dispatcher, MonitorConfig, Notice, default_registry};
use sclm_overlay::{NativeOverlay, OverlaySink};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::console::ConsoleSink;
use crate::quit::spawn_quit_listeners;

/// Conditions that end the process with a non-zero status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Tail(#[from] TailError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Monitor until the user quits or the log file becomes inaccessible.
pub async fn run(config: MonitorConfig) -> Result<(), AppError> {
    let registry = default_registry()?;
    let mut pipeline = Pipeline::new(config.clone(), registry);

    if config.fetch_organizations {
        let timeout = Duration::from_millis(config.enrichment.lookup_timeout_ms);
        match RsiLookup::new(timeout) {
            Ok(lookup) => pipeline = pipeline.with_lookup(lookup),
            Err(e) => warn!(error = %e, "Organization lookup unavailable, continuing without it"),
        }
    }
    if let Some(path) = default_cache_path() {
        pipeline = pipeline.with_cache_file(path);
    }

    let mut dispatcher = Dispatcher::new(config.sink_queue_capacity);
    dispatcher
        .register_sink("console", console_filter(&config), || {
            Ok::<_, std::convert::Infallible>(ConsoleSink::stdout())
        })
        .await?;

    if config.overlay.enabled {
        let settings = config.overlay.clone();
        let registered = dispatcher
            .register_sink("overlay", overlay_filter(&config), move || {
                OverlaySink::<NativeOverlay>::open(&settings)
            })
            .await;
        if let Err(e) = registered {
            warn!(error = %e, "Overlay unavailable, continuing with the console only");
            dispatcher
                .dispatch(&Delivery::Notice(Notice::Warning(format!(
                    "Overlay unavailable: {e}"
                ))))
                .await;
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_quit_listeners(shutdown_tx);

    let (dispatcher, result) = pipeline.run(dispatcher, shutdown_rx).await;

    if let Err(e) = tokio::task::spawn_blocking(move || dispatcher.shutdown()).await {
        warn!(error = %e, "Sink shutdown did not complete");
    }
    if let Err(e) = pipeline.save_cache() {
        warn!(error = %e, "Failed to save organization cache");
    }

    info!("Monitor stopped");
    result.map_err(AppError::from)
}
