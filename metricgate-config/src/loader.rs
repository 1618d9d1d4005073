//! Configuration loading and environment variable handling

use crate::domains::GatewayConfig;
use crate::error::{ConfigError, ConfigResult};
use log::debug;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Unprefixed variable the load-test tooling exports for the shared key
pub const LEGACY_API_KEY_VAR: &str = "METRICS_API_KEY";

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "METRICGATE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<GatewayConfig> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let mut config: GatewayConfig = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<GatewayConfig> {
        let mut config = GatewayConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<GatewayConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&self, config: &mut GatewayConfig) -> ConfigResult<()> {
        self.apply_server_overrides(config)?;
        self.apply_auth_overrides(config);
        self.apply_admission_overrides(config)?;
        self.apply_buffer_overrides(config)?;
        self.apply_logging_overrides(config)?;
        Ok(())
    }

    fn apply_server_overrides(&self, config: &mut GatewayConfig) -> ConfigResult<()> {
        if let Ok(bind) = self.get_env_var("SERVER_BIND_ADDRESS") {
            config.server.bind_address = bind;
        }
        if let Some(port) = self.parse_env_var("SERVER_PORT")? {
            config.server.port = port;
        }
        if let Ok(stream_port) = self.get_env_var("SERVER_STREAM_PORT") {
            config.server.stream_port = match stream_port.trim() {
                "" | "none" | "off" => None,
                value => Some(value.parse().map_err(|e| {
                    ConfigError::EnvError(format!("Invalid {}_SERVER_STREAM_PORT: {}", self.prefix, e))
                })?),
            };
        }
        Ok(())
    }

    fn apply_auth_overrides(&self, config: &mut GatewayConfig) {
        if let Ok(key) = self.get_env_var("API_KEY") {
            config.auth.api_key = key;
        } else if config.auth.api_key.is_empty() {
            if let Ok(key) = std::env::var(LEGACY_API_KEY_VAR) {
                config.auth.api_key = key;
            }
        }
    }

    fn apply_admission_overrides(&self, config: &mut GatewayConfig) -> ConfigResult<()> {
        if let Some(max) = self.parse_env_var("MAX_IN_FLIGHT")? {
            config.admission.max_in_flight = max;
        }
        if let Some(max) = self.parse_env_var("MAX_CONNECTIONS")? {
            config.admission.max_connections = max;
        }
        if let Some(ms) = self.parse_env_var::<u64>("ADMISSION_TIMEOUT_MS")? {
            config.admission.admission_timeout = Duration::from_millis(ms);
        }
        if let Some(rate) = self.parse_env_var("PER_CONNECTION_RATE")? {
            config.admission.per_connection_rate = rate;
        }
        Ok(())
    }

    fn apply_buffer_overrides(&self, config: &mut GatewayConfig) -> ConfigResult<()> {
        if let Some(size) = self.parse_env_var("BATCH_SIZE")? {
            config.buffer.batch_size = size;
        }
        if let Some(ms) = self.parse_env_var::<u64>("FLUSH_INTERVAL_MS")? {
            config.buffer.flush_interval = Duration::from_millis(ms);
        }
        if let Some(capacity) = self.parse_env_var("BUFFER_CAPACITY")? {
            config.buffer.capacity = capacity;
        }
        if let Some(attempts) = self.parse_env_var("FLUSH_MAX_ATTEMPTS")? {
            config.buffer.retry.max_attempts = attempts;
        }
        Ok(())
    }

    fn apply_logging_overrides(&self, config: &mut GatewayConfig) -> ConfigResult<()> {
        if let Ok(level) = self.get_env_var("LOG_LEVEL") {
            config.logging.level = crate::domains::logging::LogLevel::from_str(&level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", level)))?;
        }
        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.logging.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }
        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }

    /// Parse an optional prefixed variable
    fn parse_env_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| ConfigError::EnvError(format!("Invalid {}_{}: {}", self.prefix, name, e))),
            Err(_) => Ok(None),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
