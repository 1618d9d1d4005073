//! Ingestion pipeline for metricgate
//!
//! Submissions flow through four cooperating parts:
//!
//! 1. [`IngestService`] authenticates, admits and parses payloads from both
//!    channels (one-shot HTTP and streaming connections).
//! 2. [`AdmissionGovernor`] bounds in-flight work, connection count and
//!    per-connection message rate.
//! 3. [`BatchingEngine`] accumulates samples, seals batches on size or age and
//!    flushes them sequentially to a [`MetricSink`](metricgate_interfaces::MetricSink).
//! 4. [`AckTracker`] turns durably flushed stream frames into ACK frames for
//!    their originating connection.
//!
//! [`GatewayStats`] counts every terminal outcome.

pub mod ack;
pub mod buffer;
pub mod governor;
pub mod ingest;
pub mod stats;

pub use ack::AckTracker;
pub use buffer::{BatchingEngine, BufferSettings};
pub use governor::{AdmissionGovernor, AdmissionSource, AdmissionToken};
pub use ingest::{Accepted, ConnectionHandle, ConnectionState, IngestService};
pub use stats::{GatewayStats, StatsSnapshot};
