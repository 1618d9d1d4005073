//! Domain model: samples, batches and acknowledgement records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{IngestResult, RejectionReason};
use crate::validation::{validate_unit, validate_value};

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Kinds of metric the gateway accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Cpu,
    Memory,
    Disk,
    Network,
    Load,
}

impl MetricType {
    /// Get the string representation of the metric type
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Cpu => "cpu",
            MetricType::Memory => "memory",
            MetricType::Disk => "disk",
            MetricType::Network => "network",
            MetricType::Load => "load",
        }
    }

    /// Inclusive `(min, max)` range a value of this type may take
    pub fn plausible_range(&self) -> (f64, f64) {
        match self {
            MetricType::Cpu | MetricType::Memory | MetricType::Disk => (0.0, 100.0),
            MetricType::Network | MetricType::Load => (0.0, f64::MAX),
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = RejectionReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(MetricType::Cpu),
            "memory" | "mem" => Ok(MetricType::Memory),
            "disk" => Ok(MetricType::Disk),
            "network" | "net" => Ok(MetricType::Network),
            "load" => Ok(MetricType::Load),
            other => Err(RejectionReason::malformed(format!("unknown metric_type '{}'", other))),
        }
    }
}

/// Identity of the server a sample describes.
///
/// One-shot submissions carry a numeric id, streamed frames carry a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerId {
    Numeric(u64),
    Named(String),
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerId::Numeric(id) => write!(f, "{}", id),
            ServerId::Named(name) => write!(f, "{}", name),
        }
    }
}

/// A single validated time-series point.
///
/// Fields are private so a sample can only exist after passing validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    server_id: ServerId,
    metric_type: MetricType,
    value: f64,
    unit: String,
    timestamp: i64,
}

impl MetricSample {
    /// Validate and construct a sample
    pub fn new(
        server_id: ServerId,
        metric_type: MetricType,
        value: f64,
        unit: impl Into<String>,
        timestamp: i64,
    ) -> IngestResult<Self> {
        let unit = unit.into();
        validate_value(metric_type, value)?;
        validate_unit(&unit)?;
        if timestamp < 0 {
            return Err(RejectionReason::invalid_value("timestamp cannot be negative"));
        }

        Ok(Self {
            server_id,
            metric_type,
            value,
            unit,
            timestamp,
        })
    }

    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Milliseconds since the Unix epoch
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Identifier of one streaming connection, unique for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a streamed sample came from: its connection and gateway-assigned sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamOrigin {
    pub connection: ConnectionId,
    pub seq: u64,
}

/// Why a batch was sealed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushTrigger {
    /// Batch reached the configured sample count
    Size,
    /// Oldest sample reached the configured age
    Time,
    /// Remaining samples sealed during shutdown
    Drain,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushTrigger::Size => write!(f, "size"),
            FlushTrigger::Time => write!(f, "time"),
            FlushTrigger::Drain => write!(f, "drain"),
        }
    }
}

/// A buffered sample plus the routing information needed to acknowledge it
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    #[serde(flatten)]
    pub sample: MetricSample,
    #[serde(skip)]
    pub origin: Option<StreamOrigin>,
}

impl BatchEntry {
    /// Entry for a one-shot submission (never acknowledged over a stream)
    pub fn one_shot(sample: MetricSample) -> Self {
        Self { sample, origin: None }
    }

    /// Entry for a streamed frame
    pub fn streamed(sample: MetricSample, origin: StreamOrigin) -> Self {
        Self {
            sample,
            origin: Some(origin),
        }
    }
}

/// Samples flushed to the sink together.
///
/// `id` is the idempotency token: sinks use it to recognise a replayed flush.
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    #[serde(rename = "batch_id")]
    id: Uuid,
    created_at: i64,
    trigger: FlushTrigger,
    #[serde(rename = "samples")]
    entries: Vec<BatchEntry>,
}

impl Batch {
    /// Seal entries into a new batch with a fresh idempotency token
    pub fn new(entries: Vec<BatchEntry>, trigger: FlushTrigger) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: now_millis(),
            trigger,
            entries,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn trigger(&self) -> FlushTrigger {
        self.trigger
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn samples(&self) -> impl Iterator<Item = &MetricSample> {
        self.entries.iter().map(|entry| &entry.sample)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Proof that a streamed frame was durably accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRecord {
    /// Sequence number the client attached to the frame
    pub seq: u64,
    /// Client-side send time echoed back
    pub sent_at: i64,
    /// Time the sink accepted the batch
    pub ack_at: i64,
}
