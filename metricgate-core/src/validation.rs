//! Plausibility rules applied before a sample is constructed

use crate::error::{IngestResult, RejectionReason};
use crate::model::MetricType;

/// Maximum length of a unit label such as `%` or `bytes/s`
pub const MAX_UNIT_LEN: usize = 16;

/// Maximum length of a streamed `server_name`
pub const MAX_SERVER_NAME_LEN: usize = 128;

/// Check that `value` is finite and inside the plausible range for `metric_type`.
///
/// Out-of-range values are rejected, never clamped.
pub fn validate_value(metric_type: MetricType, value: f64) -> IngestResult<()> {
    if !value.is_finite() {
        return Err(RejectionReason::invalid_value(format!(
            "{} value must be a finite number",
            metric_type
        )));
    }

    let (min, max) = metric_type.plausible_range();
    if value < min || value > max {
        return Err(RejectionReason::invalid_value(format!(
            "{} value {} outside plausible range [{}, {}]",
            metric_type, value, min, max
        )));
    }

    Ok(())
}

/// Validate a unit label
pub fn validate_unit(unit: &str) -> IngestResult<()> {
    if unit.trim().is_empty() {
        return Err(RejectionReason::malformed("unit cannot be empty"));
    }
    if unit.chars().count() > MAX_UNIT_LEN {
        return Err(RejectionReason::invalid_value(format!(
            "unit longer than {} characters",
            MAX_UNIT_LEN
        )));
    }
    Ok(())
}

/// Validate a streamed server name
pub fn validate_server_name(name: &str) -> IngestResult<()> {
    if name.trim().is_empty() {
        return Err(RejectionReason::malformed("server_name cannot be empty"));
    }
    if name.chars().count() > MAX_SERVER_NAME_LEN {
        return Err(RejectionReason::invalid_value(format!(
            "server_name longer than {} characters",
            MAX_SERVER_NAME_LEN
        )));
    }
    Ok(())
}
