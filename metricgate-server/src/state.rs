//! Shared application state

use metricgate_config::GatewayConfig;
use metricgate_interfaces::MetricSink;
use metricgate_pipeline::{AckTracker, AdmissionGovernor, BatchingEngine, BufferSettings, GatewayStats, IngestService};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Everything a handler needs, cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestService>,
    pub sink: Arc<dyn MetricSink>,
    pub max_frame_bytes: usize,
    pub started_at: Instant,
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    /// Build the pipeline for a validated config. Spawns the batching engine's
    /// tasks, so it must run inside a tokio runtime.
    pub fn new(config: &GatewayConfig, sink: Arc<dyn MetricSink>) -> Self {
        let stats = Arc::new(GatewayStats::new());
        let acks = Arc::new(AckTracker::new(stats.clone()));
        let governor = Arc::new(AdmissionGovernor::new(&config.admission));
        let engine = Arc::new(BatchingEngine::start(
            BufferSettings::from(&config.buffer),
            sink.clone(),
            acks.clone(),
            stats.clone(),
        ));

        let ingest = Arc::new(IngestService::new(
            config.auth.api_key.clone(),
            config.server.max_body_bytes,
            governor,
            engine,
            acks,
            stats,
        ));

        let (shutdown, _) = watch::channel(false);

        Self {
            ingest,
            sink,
            max_frame_bytes: config.server.max_body_bytes,
            started_at: Instant::now(),
            shutdown: Arc::new(shutdown),
        }
    }

    /// Tell streaming connections to close
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Receiver that flips to `true` once shutdown begins
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}
