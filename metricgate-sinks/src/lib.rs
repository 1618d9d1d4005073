//! Sink adapters for metricgate
//!
//! Every adapter implements [`MetricSink`] and is idempotent with respect to
//! the batch id, so the pipeline may replay a flush after a transient error.

pub mod file;
pub mod log;
pub mod memory;
pub mod webhook;

pub use file::FileSink;
pub use log::LogSink;
pub use memory::MemorySink;
pub use webhook::WebhookSink;

use metricgate_config::SinkConfig;
use metricgate_interfaces::MetricSink;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while constructing a sink from configuration
#[derive(Debug, Error)]
pub enum SinkBuildError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid sink configuration: {0}")]
    InvalidConfig(String),
}

/// Build the configured sink
pub fn build_sink(config: &SinkConfig) -> Result<Arc<dyn MetricSink>, SinkBuildError> {
    let sink: Arc<dyn MetricSink> = match config {
        SinkConfig::Memory => Arc::new(MemorySink::new()),
        SinkConfig::Log => Arc::new(LogSink::new()),
        SinkConfig::File { path, dedupe_window } => Arc::new(FileSink::new(path, *dedupe_window)),
        SinkConfig::Webhook { url, timeout, headers } => {
            Arc::new(WebhookSink::new(url.clone(), *timeout, headers.clone())?)
        }
    };

    tracing::info!("Using {} sink", sink.name());
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_build_each_sink() {
        assert_eq!(build_sink(&SinkConfig::Memory).unwrap().name(), "memory");
        assert_eq!(build_sink(&SinkConfig::Log).unwrap().name(), "log");

        let file = SinkConfig::File {
            path: "/tmp/metricgate-test.jsonl".to_string(),
            dedupe_window: 16,
        };
        assert_eq!(build_sink(&file).unwrap().name(), "file");

        let webhook = SinkConfig::Webhook {
            url: "http://127.0.0.1:9/batches".to_string(),
            timeout: Duration::from_secs(1),
            headers: HashMap::new(),
        };
        assert_eq!(build_sink(&webhook).unwrap().name(), "webhook");
    }

    #[test]
    fn test_invalid_webhook_header_rejected() {
        let mut headers = HashMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        let webhook = SinkConfig::Webhook {
            url: "http://127.0.0.1:9/batches".to_string(),
            timeout: Duration::from_secs(1),
            headers,
        };
        assert!(matches!(build_sink(&webhook), Err(SinkBuildError::InvalidConfig(_))));
    }
}
