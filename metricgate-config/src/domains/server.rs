//! Listener configuration for the HTTP and streaming endpoints

use crate::error::ConfigResult;
use crate::validation::{validate_port_range, validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address both listeners bind to
    pub bind_address: String,

    /// Port serving `POST /api/metrics`, `/ws`, `/health` and `/api/stats`
    pub port: u16,

    /// Optional dedicated port accepting WebSocket upgrades on `/`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_port: Option<u16>,

    /// Largest accepted request body or stream frame, in bytes
    pub max_body_bytes: usize,

    #[serde(default = "crate::domains::utils::default_true")]
    pub enable_cors: bool,

    #[serde(default = "crate::domains::utils::default_true")]
    pub enable_request_id: bool,

    #[serde(default = "crate::domains::utils::default_true")]
    pub enable_tracing: bool,

    /// How long in-flight work may take to finish after a shutdown signal
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            stream_port: Some(8081),
            max_body_bytes: 64 * 1024,
            enable_cors: true,
            enable_request_id: true,
            enable_tracing: true,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// `host:port` of the main listener
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// `host:port` of the dedicated stream listener, if configured
    pub fn stream_addr(&self) -> Option<String> {
        self.stream_port.map(|port| format!("{}:{}", self.bind_address, port))
    }
}

impl Validatable for ServerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.bind_address, "bind_address", self.domain_name())?;
        validate_port_range(self.port, "port", self.domain_name())?;
        validate_positive(self.max_body_bytes, "max_body_bytes", self.domain_name())?;

        if let Some(stream_port) = self.stream_port {
            validate_port_range(stream_port, "stream_port", self.domain_name())?;
            if stream_port == self.port {
                return Err(self.validation_error("stream_port must differ from port"));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http_addr(), "0.0.0.0:8000");
        assert_eq!(config.stream_addr().as_deref(), Some("0.0.0.0:8081"));
    }

    #[test]
    fn test_stream_port_must_differ() {
        let config = ServerConfig {
            stream_port: Some(8000),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
