//! Batching engine configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Buffer and batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Samples per batch before a size-triggered flush
    pub batch_size: usize,

    /// Maximum age of the oldest unflushed sample before a time-triggered flush
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Samples held in memory (accumulating or awaiting flush) before `BufferFull`
    pub capacity: usize,

    /// Retry behaviour when the sink fails
    pub retry: RetryConfig,
}

/// Bounded exponential retry for sink flushes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per batch, including the first
    pub max_attempts: u32,

    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Growth factor between consecutive delays
    pub multiplier: f64,

    #[serde(default = "crate::domains::utils::default_true")]
    pub jitter: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            flush_interval: Duration::from_millis(200),
            capacity: 50_000,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl Validatable for BufferConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.batch_size, "batch_size", self.domain_name())?;
        validate_positive(self.capacity, "capacity", self.domain_name())?;
        validate_positive(self.retry.max_attempts, "retry.max_attempts", self.domain_name())?;

        if self.flush_interval.is_zero() {
            return Err(self.validation_error("flush_interval must be greater than 0"));
        }
        if self.capacity < self.batch_size {
            return Err(self.validation_error(format!(
                "capacity ({}) must be at least batch_size ({})",
                self.capacity, self.batch_size
            )));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(self.validation_error("retry.multiplier must be >= 1.0"));
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(self.validation_error("retry.initial_delay must not exceed retry.max_delay"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "buffer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_buffer_config() {
        assert!(BufferConfig::default().validate().is_ok());
    }

    #[test]
    fn test_capacity_below_batch_size() {
        let config = BufferConfig {
            batch_size: 100,
            capacity: 10,
            ..BufferConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = BufferConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
