//! Shared-key authentication

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Minimum accepted key length
const MIN_KEY_LENGTH: usize = 8;

/// Authentication configuration.
///
/// There is deliberately no default key: it must come from the config file or
/// the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret every client must present
    pub api_key: String,
}

impl Validatable for AuthConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(self.validation_error(
                "api_key must be provided (auth.api_key, METRICGATE_API_KEY or METRICS_API_KEY)",
            ));
        }
        if self.api_key.len() < MIN_KEY_LENGTH {
            return Err(self.validation_error(format!(
                "api_key must be at least {} characters",
                MIN_KEY_LENGTH
            )));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "auth"
    }
}
