//! Admission and rate governance

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Admission configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Requests and stream messages processed concurrently before shedding load
    pub max_in_flight: usize,

    /// Longest a caller may wait for an in-flight slot; zero rejects immediately
    #[serde(with = "humantime_serde")]
    pub admission_timeout: Duration,

    /// Concurrent streaming connections accepted
    pub max_connections: usize,

    /// Sustained messages per second allowed on one connection
    pub per_connection_rate: f64,

    /// Messages a connection may send in a burst above the sustained rate
    pub per_connection_burst: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 256,
            admission_timeout: Duration::from_millis(50),
            max_connections: 512,
            per_connection_rate: 10.0,
            per_connection_burst: 20,
        }
    }
}

impl Validatable for AdmissionConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_in_flight, "max_in_flight", self.domain_name())?;
        validate_positive(self.max_connections, "max_connections", self.domain_name())?;
        validate_positive(self.per_connection_burst, "per_connection_burst", self.domain_name())?;

        if !self.per_connection_rate.is_finite() || self.per_connection_rate <= 0.0 {
            return Err(self.validation_error("per_connection_rate must be a positive number"));
        }
        if self.admission_timeout > Duration::from_secs(5) {
            return Err(self.validation_error("admission_timeout must not exceed 5s"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "admission"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_admission_config() {
        assert!(AdmissionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_rate() {
        let config = AdmissionConfig {
            per_connection_rate: 0.0,
            ..AdmissionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unbounded_wait_is_rejected() {
        let config = AdmissionConfig {
            admission_timeout: Duration::from_secs(60),
            ..AdmissionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
