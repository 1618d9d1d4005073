//! Core domain model for metricgate
//!
//! This crate holds the types shared by every layer of the gateway:
//! - [`MetricSample`] and its validation rules
//! - Wire frames for the HTTP and streaming channels
//! - [`Batch`] and [`AckRecord`] produced by the pipeline
//! - [`RejectionReason`], the caller-facing error taxonomy

pub mod error;
pub mod frames;
pub mod model;
pub mod validation;

pub use error::{IngestResult, RejectionReason};
pub use frames::{AckFrame, MetricSubmission, NackFrame, StreamFrame};
pub use model::{
    now_millis, AckRecord, Batch, BatchEntry, ConnectionId, FlushTrigger, MetricSample, MetricType, ServerId,
    StreamOrigin,
};
