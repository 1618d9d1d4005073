//! Caller-facing rejection taxonomy

use thiserror::Error;

/// Result type for ingestion operations
pub type IngestResult<T> = Result<T, RejectionReason>;

/// Why a submission, connection or message was refused.
///
/// Every variant surfaces to the caller immediately; none of them is retried
/// inside the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    /// Missing or mismatched shared key
    #[error("Unauthorized: missing or invalid API key")]
    Unauthorized,

    /// Payload did not decode into the expected shape
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// Payload decoded but a field is outside its plausible range
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Admission ceiling or rate window exceeded
    #[error("Overloaded: admission limit reached")]
    Overloaded,

    /// Batching engine has no room for more samples
    #[error("Buffer full: samples are not being flushed fast enough")]
    BufferFull,
}

impl RejectionReason {
    /// Stable machine-readable code used in HTTP bodies and NACK frames
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::Unauthorized => "UNAUTHORIZED",
            RejectionReason::Malformed(_) => "MALFORMED",
            RejectionReason::InvalidValue(_) => "INVALID_VALUE",
            RejectionReason::Overloaded => "OVERLOADED",
            RejectionReason::BufferFull => "BUFFER_FULL",
        }
    }

    /// Convenience constructor for decode failures
    pub fn malformed(message: impl Into<String>) -> Self {
        RejectionReason::Malformed(message.into())
    }

    /// Convenience constructor for range failures
    pub fn invalid_value(message: impl Into<String>) -> Self {
        RejectionReason::InvalidValue(message.into())
    }
}

impl From<serde_json::Error> for RejectionReason {
    fn from(error: serde_json::Error) -> Self {
        RejectionReason::Malformed(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(RejectionReason::Unauthorized.code(), "UNAUTHORIZED");
        assert_eq!(RejectionReason::malformed("x").code(), "MALFORMED");
        assert_eq!(RejectionReason::invalid_value("x").code(), "INVALID_VALUE");
        assert_eq!(RejectionReason::Overloaded.code(), "OVERLOADED");
        assert_eq!(RejectionReason::BufferFull.code(), "BUFFER_FULL");
    }

    #[test]
    fn test_json_error_maps_to_malformed() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let reason: RejectionReason = err.into();
        assert!(matches!(reason, RejectionReason::Malformed(_)));
    }
}
