//! Shared harness: a gateway on ephemeral ports backed by a memory sink

#![allow(dead_code)]

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use metricgate_config::GatewayConfig;
use metricgate_server::{AppState, Server};
use metricgate_sinks::MemorySink;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const API_KEY: &str = "integration-test-key";

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Keep test output down to warnings
pub fn init_quiet_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_target(false)
            .without_time()
            .try_init();
    });
}

/// Config with small batches and a short window so tests see flushes quickly
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.auth.api_key = API_KEY.to_string();
    config.server.bind_address = "127.0.0.1".to_string();
    config.server.enable_tracing = false;
    config.server.shutdown_timeout = Duration::from_secs(5);
    config.buffer.batch_size = 50;
    config.buffer.flush_interval = Duration::from_millis(25);
    config
}

pub struct TestGateway {
    pub http_addr: SocketAddr,
    pub stream_addr: SocketAddr,
    pub sink: Arc<MemorySink>,
    pub state: AppState,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl TestGateway {
    pub async fn start(config: GatewayConfig) -> Result<Self> {
        init_quiet_logging();

        let http = TcpListener::bind("127.0.0.1:0").await?;
        let stream = TcpListener::bind("127.0.0.1:0").await?;
        let http_addr = http.local_addr()?;
        let stream_addr = stream.local_addr()?;

        let sink = Arc::new(MemorySink::new());
        let server = Server::with_sink(config, sink.clone());
        let state = server.state().clone();

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(server.serve(http, Some(stream), async move {
            let _ = stopped.await;
        }));

        Ok(Self {
            http_addr,
            stream_addr,
            sink,
            state,
            stop: Some(stop),
            task,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.http_addr, path)
    }

    /// Stream URL on the dedicated listener
    pub fn stream_url(&self, key: &str) -> String {
        format!("ws://{}/?key={}", self.stream_addr, key)
    }

    pub async fn connect(&self) -> Result<WsClient> {
        let (ws, _) = connect_async(self.stream_url(API_KEY)).await?;
        Ok(ws)
    }

    /// Poll the sink until it holds at least `count` samples
    pub async fn wait_for_samples(&self, count: usize, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        while tokio::time::Instant::now() < deadline {
            if self.sink.sample_count() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sink.sample_count() >= count
    }

    /// Trigger shutdown and wait for the drain to finish
    pub async fn stop(mut self) -> Result<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await?
    }
}

pub fn frame(seq: u64, server: &str) -> Message {
    let body = json!({
        "seq": seq,
        "server_name": server,
        "cpu_usage": 42.5,
        "memory_usage": 63.0,
        "sent_at": 1_700_000_000_000_i64 + seq as i64,
    });
    Message::Text(body.to_string().into())
}

/// Next JSON frame from the gateway, skipping control frames
pub async fn next_json(ws: &mut WsClient, within: Duration) -> Option<Value> {
    loop {
        let message = tokio::time::timeout(within, ws.next()).await.ok()??.ok()?;
        match message {
            Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

/// Send `count` frames with seq 1..=count and collect the ACKed sequences
pub async fn stream_frames(ws: &mut WsClient, server: &str, count: u64, within: Duration) -> Result<Vec<u64>> {
    for seq in 1..=count {
        ws.send(frame(seq, server)).await?;
    }
    collect_acks(ws, count, within).await
}

/// Read ACKs until `count` arrived or the stream goes quiet
pub async fn collect_acks(ws: &mut WsClient, count: u64, within: Duration) -> Result<Vec<u64>> {
    let mut acked = Vec::new();
    while (acked.len() as u64) < count {
        match next_json(ws, within).await {
            Some(value) if value.get("ack_seq").is_some() => {
                acked.push(value["ack_seq"].as_u64().unwrap_or_default());
            }
            Some(other) => anyhow::bail!("unexpected frame from gateway: {}", other),
            None => break,
        }
    }
    Ok(acked)
}
