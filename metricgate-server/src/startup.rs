//! Server startup and graceful shutdown

use anyhow::{Context, Result};
use axum::Router;
use metricgate_config::GatewayConfig;
use metricgate_interfaces::MetricSink;
use metricgate_sinks::build_sink;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::routes::{build_router, build_stream_router};
use crate::state::AppState;

/// The gateway: configuration plus a running ingestion pipeline
pub struct Server {
    config: GatewayConfig,
    state: AppState,
}

impl Server {
    /// Validate the config, build the configured sink and start the pipeline
    pub async fn new(config: GatewayConfig) -> Result<Self> {
        config.validate_all().context("Invalid configuration")?;
        let sink = build_sink(&config.sink).context("Failed to build sink")?;
        Ok(Self::with_sink(config, sink))
    }

    /// Start the pipeline against a caller-provided sink
    pub fn with_sink(config: GatewayConfig, sink: Arc<dyn MetricSink>) -> Self {
        let state = AppState::new(&config, sink);
        Self { config, state }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Router for the main listener
    pub fn build_app(&self) -> Router {
        build_router(self.state.clone(), &self.config.server)
    }

    /// Router for the dedicated stream listener
    pub fn build_stream_app(&self) -> Router {
        build_stream_router(self.state.clone(), &self.config.server)
    }

    /// Bind the configured listeners and serve until SIGINT or SIGTERM
    pub async fn start(self) -> Result<()> {
        let http_addr = self.config.server.http_addr();
        let http = TcpListener::bind(&http_addr)
            .await
            .with_context(|| format!("Failed to bind {}", http_addr))?;

        let stream = match self.config.server.stream_addr() {
            Some(addr) => Some(
                TcpListener::bind(&addr)
                    .await
                    .with_context(|| format!("Failed to bind stream listener {}", addr))?,
            ),
            None => None,
        };

        self.serve(http, stream, shutdown_signal()).await
    }

    /// Serve on already-bound listeners until `shutdown` resolves, then drain.
    ///
    /// Shutdown order: stop accepting, close streaming connections, refuse new
    /// admissions, then flush whatever is buffered within `shutdown_timeout`.
    pub async fn serve<F>(self, http: TcpListener, stream: Option<TcpListener>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.log_config_summary();

        let http_app = self.build_app();
        let stream_app = self.build_stream_app();

        let trigger = self.state.clone();
        tokio::spawn(async move {
            shutdown.await;
            trigger.begin_shutdown();
        });

        tracing::info!("Listening on {}", http.local_addr()?);
        let http_shutdown = wait_for_shutdown(self.state.shutdown_receiver());
        let http_task =
            tokio::spawn(async move { axum::serve(http, http_app).with_graceful_shutdown(http_shutdown).await });

        let stream_task = match stream {
            Some(listener) => {
                tracing::info!("Stream listener on {}", listener.local_addr()?);
                let stream_shutdown = wait_for_shutdown(self.state.shutdown_receiver());
                Some(tokio::spawn(async move {
                    axum::serve(listener, stream_app)
                        .with_graceful_shutdown(stream_shutdown)
                        .await
                }))
            }
            None => None,
        };

        let http_result = http_task.await;
        let stream_result = match stream_task {
            Some(task) => Some(task.await),
            None => None,
        };

        self.drain().await;

        http_result.context("HTTP listener task panicked")??;
        if let Some(result) = stream_result {
            result.context("Stream listener task panicked")??;
        }

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    async fn drain(&self) {
        let ingest = &self.state.ingest;
        ingest.governor().close();

        let timeout = self.config.server.shutdown_timeout;
        tracing::info!(
            "Draining {} buffered samples (timeout {:?})",
            ingest.engine().outstanding(),
            timeout
        );

        let abandoned = ingest.engine().shutdown_within(timeout).await;
        if abandoned > 0 {
            tracing::error!(
                "Drain did not finish within {:?}: {} samples dropped",
                timeout,
                abandoned
            );
        }

        let stats = ingest.stats().snapshot();
        tracing::info!(
            "Final counts: {} samples flushed, {} dropped, {} rejections",
            stats.samples_flushed,
            stats.samples_dropped,
            stats.rejected.total()
        );
    }

    fn log_config_summary(&self) {
        let server = &self.config.server;
        tracing::info!("=== metricgate configuration ===");
        tracing::info!("HTTP: {}", server.http_addr());
        tracing::info!("Stream: {}", server.stream_addr().unwrap_or_else(|| "disabled".to_string()));
        tracing::info!("Sink: {}", self.state.sink.name());
        tracing::info!(
            "Batching: size {} / interval {:?} / capacity {}",
            self.config.buffer.batch_size,
            self.config.buffer.flush_interval,
            self.config.buffer.capacity
        );
        tracing::info!(
            "Admission: {} in flight / {} connections",
            self.config.admission.max_in_flight,
            self.config.admission.max_connections
        );
        tracing::info!("CORS: {}", if server.enable_cors { "Enabled" } else { "Disabled" });
        tracing::info!("Request ID: {}", if server.enable_request_id { "Enabled" } else { "Disabled" });
        tracing::info!("Tracing: {}", if server.enable_tracing { "Enabled" } else { "Disabled" });
        tracing::info!("================================");
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // an error means the state was dropped, which also ends serving
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
