//! Domain-specific configuration modules

pub mod admission;
pub mod auth;
pub mod buffer;
pub mod logging;
pub mod server;
pub mod sink;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main gateway configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration
    pub server: server::ServerConfig,

    /// Shared-key authentication
    pub auth: auth::AuthConfig,

    /// Admission and rate governance
    pub admission: admission::AdmissionConfig,

    /// Batching engine configuration
    pub buffer: buffer::BufferConfig,

    /// Durable sink selection
    pub sink: sink::SinkConfig,

    /// Logging configuration
    pub logging: logging::LoggingConfig,
}

impl GatewayConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.server.validate()?;
        self.auth.validate()?;
        self.admission.validate()?;
        self.buffer.validate()?;
        self.sink.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let mut config = GatewayConfig::default();
        config.auth.api_key = "change-me".to_string();
        serde_yaml::to_string(&config).unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
