//! Domain-driven configuration management for metricgate
//!
//! Configuration is split by functional domain (server, auth, admission,
//! buffer, sink, logging). Every domain has defaults, validation and
//! environment variable overrides.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

// Re-export domain configurations
pub use domains::{
    admission::AdmissionConfig,
    auth::AuthConfig,
    buffer::{BufferConfig, RetryConfig},
    logging::{LogFormat, LogLevel, LoggingConfig},
    server::ServerConfig,
    sink::SinkConfig,
    GatewayConfig,
};
