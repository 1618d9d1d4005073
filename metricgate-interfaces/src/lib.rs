//! # metricgate interfaces
//!
//! Traits at the seam between the ingestion pipeline and durable storage.
//! The pipeline only depends on [`MetricSink`]; concrete adapters live in
//! `metricgate-sinks` or in the embedding application.

pub mod sink;

pub use sink::{MetricSink, SinkError, SinkHealth};
