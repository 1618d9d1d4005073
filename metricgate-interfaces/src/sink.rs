//! Durable storage contract

use async_trait::async_trait;
use metricgate_core::Batch;
use metricgate_resilience::Retryable;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a sink for a single flush
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    /// Storage is temporarily unavailable; the same batch may be retried
    #[error("Transient sink failure: {message}")]
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Storage refused the batch; retrying cannot help
    #[error("Fatal sink failure: {message}")]
    Fatal { message: String },
}

impl SinkError {
    pub fn transient(message: impl Into<String>) -> Self {
        SinkError::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        SinkError::Fatal {
            message: message.into(),
        }
    }
}

impl Retryable for SinkError {
    fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Transient { .. })
    }

    fn retry_delay(&self) -> Option<Duration> {
        match self {
            SinkError::Transient { retry_after, .. } => *retry_after,
            SinkError::Fatal { .. } => None,
        }
    }
}

/// Health reported by a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkHealth {
    Healthy,
    Degraded { reason: String },
    Unhealthy { reason: String },
}

/// Durable storage for metric batches.
///
/// Implementations must be idempotent with respect to [`Batch::id`]: flushing a
/// batch that was already accepted returns `Ok(())` without applying it twice.
/// The pipeline retries a batch only after `Transient` errors.
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Name used in logs and stats
    fn name(&self) -> &str;

    /// Persist one batch
    async fn flush(&self, batch: &Batch) -> Result<(), SinkError>;

    /// Report sink health; sinks without a health check are always healthy
    async fn health_check(&self) -> SinkHealth {
        SinkHealth::Healthy
    }
}
