//! Wires tailer, extractor, enrichment and dispatcher together.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sclm_types::MonitorConfig;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::dispatch::{Delivery, Dispatcher};
use crate::enrichment::{
    Enricher, OrgCache, OrgLookup, enrichment_stage, load_cache_file, save_cache_file,
};
use crate::error::{CacheError, TailError};
use crate::events::{Extractor, Ingested, Notice, RecordStream};
use crate::log::{TailStatus, Tailer};
use crate::patterns::PatternRegistry;

/// Resolve once the shutdown flag is raised or its sender is dropped.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

pub struct Pipeline<L> {
    config: MonitorConfig,
    registry: Arc<PatternRegistry>,
    enricher: Option<Enricher<L>>,
    cache_path: Option<PathBuf>,
}

impl<L: OrgLookup> Pipeline<L> {
    pub fn new(config: MonitorConfig, registry: PatternRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            enricher: None,
            cache_path: None,
        }
    }

    /// Enable organization enrichment through `lookup`.
    ///
    /// Ignored when organization fetching is disabled in the config.
    pub fn with_lookup(mut self, lookup: L) -> Self {
        if !self.config.fetch_organizations {
            debug!("Organization fetching disabled, lookup not installed");
            return self;
        }
        let settings = &self.config.enrichment;
        let cache = OrgCache::new(
            lookup,
            Duration::from_millis(settings.lookup_timeout_ms),
            chrono::Duration::days(i64::from(settings.org_cache_ttl_days)),
        );
        self.enricher = Some(Enricher::new(Arc::new(cache)));
        self
    }

    /// Persist the organization cache at `path`, loading what is there now.
    pub fn with_cache_file(mut self, path: PathBuf) -> Self {
        if !self.config.enrichment.persist_org_cache {
            return self;
        }
        if let Some(enricher) = &self.enricher {
            match load_cache_file(&path) {
                Ok(entries) => {
                    let loaded = enricher.cache().preload(entries);
                    info!(path = %path.display(), loaded, "Loaded organization cache");
                }
                Err(e) => warn!(error = %e, path = %path.display(), "Ignoring unreadable organization cache"),
            }
        }
        self.cache_path = Some(path);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn log_file_path(&self) -> &Path {
        &self.config.log_file_path
    }

    /// Tail the log until shutdown is requested or tailing fails fatally.
    ///
    /// The dispatcher is handed back so the caller can join the sink threads.
    pub async fn run(
        &self,
        mut dispatcher: Dispatcher,
        mut shutdown: watch::Receiver<bool>,
    ) -> (Dispatcher, Result<(), TailError>) {
        let tailer = Tailer::new(&self.config.log_file_path, self.config.tailing.clone());
        let mut stream = RecordStream::new(tailer, Extractor::new(Arc::clone(&self.registry)));
        let (stage_tx, mut stage) =
            enrichment_stage(self.enricher.clone(), self.config.sink_queue_capacity);

        let mut dispatch_shutdown = shutdown.clone();
        let forward = tokio::spawn(async move {
            let interrupted = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut dispatch_shutdown) => true,
                _ = stage.run(&mut dispatcher) => false,
            };
            if interrupted {
                let aborted = stage.abort_pending();
                debug!(aborted, "Abandoned pending enrichment");
            }
            dispatcher
        });

        info!(path = %self.config.log_file_path.display(), "Monitoring log file");
        stage_tx.submit(Delivery::Notice(Notice::Banner)).await;

        let result = loop {
            let ingested = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break Ok(()),
                ingested = stream.next() => ingested,
            };

            let delivery = match ingested {
                Ok(Ingested::Record(record)) => Delivery::Record(record),
                Ok(Ingested::Status(TailStatus::WaitingForFile(path))) => {
                    Delivery::Notice(Notice::WaitingForFile(path))
                }
                Ok(Ingested::Status(TailStatus::Restarted(_))) => Delivery::Notice(Notice::Restarting),
                Ok(Ingested::Status(TailStatus::Opened(_))) => continue,
                Err(e) => {
                    error!(error = %e, "Tailing stopped");
                    break Err(e);
                }
            };

            if !stage_tx.submit(delivery).await {
                break Ok(());
            }
        };

        // Releases the file handle before waiting on the sinks.
        drop(stream);
        drop(stage_tx);

        match forward.await {
            Ok(dispatcher) => (dispatcher, result),
            Err(e) => {
                error!(error = %e, "Dispatch task failed");
                (Dispatcher::new(1), result)
            }
        }
    }

    /// Write the organization cache if persistence is enabled.
    pub fn save_cache(&self) -> Result<(), CacheError> {
        match (&self.enricher, &self.cache_path) {
            (Some(enricher), Some(path)) => save_cache_file(path, enricher.cache().snapshot()),
            _ => Ok(()),
        }
    }
}
