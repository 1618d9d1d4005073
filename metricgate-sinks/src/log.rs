//! Sink that records each batch as a structured log event

use async_trait::async_trait;
use metricgate_core::Batch;
use metricgate_interfaces::{MetricSink, SinkError};
use tracing::{debug, info};

/// Emits one `info` event per batch and one `debug` event per sample
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetricSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn flush(&self, batch: &Batch) -> Result<(), SinkError> {
        info!(
            target: "metricgate::sink",
            batch_id = %batch.id(),
            samples = batch.len(),
            trigger = %batch.trigger(),
            "Batch accepted"
        );
        for sample in batch.samples() {
            debug!(
                target: "metricgate::sink",
                batch_id = %batch.id(),
                server = %sample.server_id(),
                metric = %sample.metric_type(),
                value = sample.value(),
                unit = sample.unit(),
                timestamp = sample.timestamp(),
                "Sample"
            );
        }
        Ok(())
    }
}
