//! Wire formats for the HTTP and streaming channels

use serde::{Deserialize, Serialize};

use crate::error::{IngestResult, RejectionReason};
use crate::model::{AckRecord, MetricSample, MetricType, ServerId};
use crate::validation::validate_server_name;

/// Body of `POST /api/metrics`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSubmission {
    pub server_id: u64,
    pub metric_type: String,
    pub value: f64,
    pub unit: String,
    /// Optional client timestamp; the gateway stamps receipt time otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl MetricSubmission {
    /// Decode a request body
    pub fn parse(payload: &[u8]) -> IngestResult<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Validate into a sample, stamping `received_at` when no timestamp was sent
    pub fn into_sample(self, received_at: i64) -> IngestResult<MetricSample> {
        let metric_type: MetricType = self.metric_type.parse()?;
        MetricSample::new(
            ServerId::Numeric(self.server_id),
            metric_type,
            self.value,
            self.unit,
            self.timestamp.unwrap_or(received_at),
        )
    }
}

/// Inbound streaming frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamFrame {
    pub seq: u64,
    pub server_name: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    /// Client send time in ms, echoed back in the ACK
    pub sent_at: i64,
}

impl StreamFrame {
    /// Decode a text frame
    pub fn parse(payload: &[u8]) -> IngestResult<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Expand the frame into its samples (one per carried metric).
    ///
    /// Either every sample validates or the whole frame is rejected.
    pub fn to_samples(&self) -> IngestResult<Vec<MetricSample>> {
        validate_server_name(&self.server_name)?;
        if self.sent_at < 0 {
            return Err(RejectionReason::invalid_value("sent_at cannot be negative"));
        }

        let server = ServerId::Named(self.server_name.clone());
        Ok(vec![
            MetricSample::new(server.clone(), MetricType::Cpu, self.cpu_usage, "%", self.sent_at)?,
            MetricSample::new(server, MetricType::Memory, self.memory_usage, "%", self.sent_at)?,
        ])
    }
}

/// Outbound acknowledgement frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckFrame {
    pub ack_seq: u64,
    pub ack_ts: i64,
    pub sent_at: i64,
}

impl From<AckRecord> for AckFrame {
    fn from(record: AckRecord) -> Self {
        Self {
            ack_seq: record.seq,
            ack_ts: record.ack_at,
            sent_at: record.sent_at,
        }
    }
}

/// Outbound per-message rejection frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NackFrame {
    /// Client sequence of the rejected frame, when it could be decoded
    pub nack_seq: Option<u64>,
    pub code: String,
    pub message: String,
}

impl NackFrame {
    pub fn new(nack_seq: Option<u64>, reason: &RejectionReason) -> Self {
        Self {
            nack_seq,
            code: reason.code().to_string(),
            message: reason.to_string(),
        }
    }
}
