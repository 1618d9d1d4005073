//! Durable sink selection

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Which sink adapter receives flushed batches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Keep batches in process memory (development and tests)
    Memory,

    /// Emit one structured log event per batch
    Log,

    /// Append samples as JSON lines to a local file
    File {
        path: String,
        /// Recently flushed batch ids remembered for duplicate suppression
        #[serde(default = "default_dedupe_window")]
        dedupe_window: usize,
    },

    /// POST each batch to an HTTP endpoint
    Webhook {
        url: String,
        #[serde(default = "default_webhook_timeout", with = "humantime_serde")]
        timeout: Duration,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Log
    }
}

impl SinkConfig {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            SinkConfig::Memory => "memory",
            SinkConfig::Log => "log",
            SinkConfig::File { .. } => "file",
            SinkConfig::Webhook { .. } => "webhook",
        }
    }
}

fn default_dedupe_window() -> usize {
    4096
}

fn default_webhook_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Validatable for SinkConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self {
            SinkConfig::Memory | SinkConfig::Log => Ok(()),
            SinkConfig::File { path, dedupe_window } => {
                validate_required_string(path, "path", self.domain_name())?;
                validate_positive(*dedupe_window, "dedupe_window", self.domain_name())
            }
            SinkConfig::Webhook { url, timeout, .. } => {
                validate_url(url, "url", self.domain_name())?;
                if timeout.is_zero() {
                    return Err(self.validation_error("timeout must be greater than 0"));
                }
                Ok(())
            }
        }
    }

    fn domain_name(&self) -> &'static str {
        "sink"
    }
}
