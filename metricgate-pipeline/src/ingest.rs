//! Ingestion protocol layer
//!
//! Both channels follow the same order: authenticate, admit, then parse.
//! A rejection at any step leaves the buffer untouched.

use crate::ack::AckTracker;
use crate::buffer::BatchingEngine;
use crate::governor::{AdmissionGovernor, AdmissionSource};
use crate::stats::GatewayStats;
use metricgate_core::{
    now_millis, AckFrame, BatchEntry, ConnectionId, IngestResult, MetricSubmission, RejectionReason, StreamFrame,
    StreamOrigin,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Outcome of a successful submission or message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    /// One-shot submission buffered
    Created { samples: usize },
    /// Stream frame buffered; an ACK follows once its batch is flushed
    Queued { seq: u64, client_seq: u64 },
}

/// Lifecycle of a streaming connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Authenticated, no frame accepted yet
    Open,
    /// At least one frame accepted
    Active,
    /// Close requested, slot still held
    Closing,
    /// Slot and ACK routing released
    Closed,
}

/// One authenticated streaming client.
///
/// Owned by the connection's read loop. Dropping the handle releases the
/// connection slot and stops ACK routing; samples already buffered still flush.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    state: ConnectionState,
    sequence_counter: u64,
    last_client_seq: Option<u64>,
    ack_receiver: Option<mpsc::UnboundedReceiver<AckFrame>>,
    governor: Arc<AdmissionGovernor>,
    acks: Arc<AckTracker>,
    stats: Arc<GatewayStats>,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Gateway sequence of the last accepted frame (0 before the first)
    pub fn sequence(&self) -> u64 {
        self.sequence_counter
    }

    /// Client `seq` of the last accepted frame
    pub fn last_client_seq(&self) -> Option<u64> {
        self.last_client_seq
    }

    /// Take the ACK channel for the connection's writer; `None` after the first call
    pub fn take_ack_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<AckFrame>> {
        self.ack_receiver.take()
    }

    /// Mark the connection as closing; further messages are rejected
    pub fn begin_close(&mut self) {
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Closing;
        }
    }

    fn release(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        self.acks.deregister(self.id);
        self.governor.deregister(self.id);
        self.stats.connections_closed.fetch_add(1, Ordering::Relaxed);
        debug!("{} closed after {} frame(s)", self.id, self.sequence_counter);
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Entry point for both ingestion channels
pub struct IngestService {
    api_key: String,
    max_payload_bytes: usize,
    next_connection: AtomicU64,
    governor: Arc<AdmissionGovernor>,
    engine: Arc<BatchingEngine>,
    acks: Arc<AckTracker>,
    stats: Arc<GatewayStats>,
}

impl IngestService {
    pub fn new(
        api_key: impl Into<String>,
        max_payload_bytes: usize,
        governor: Arc<AdmissionGovernor>,
        engine: Arc<BatchingEngine>,
        acks: Arc<AckTracker>,
        stats: Arc<GatewayStats>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            max_payload_bytes,
            next_connection: AtomicU64::new(1),
            governor,
            engine,
            acks,
            stats,
        }
    }

    /// Check a presented key against the shared secret
    pub fn authenticate(&self, presented: Option<&str>) -> IngestResult<()> {
        match presented {
            Some(key) if constant_time_eq(key.as_bytes(), self.api_key.as_bytes()) => Ok(()),
            _ => Err(RejectionReason::Unauthorized),
        }
    }

    /// Accept one HTTP submission
    pub async fn submit_once(&self, payload: &[u8], auth_key: Option<&str>) -> IngestResult<Accepted> {
        let result = self.submit_once_inner(payload, auth_key).await;
        match &result {
            Ok(_) => {
                self.stats.submissions_accepted.fetch_add(1, Ordering::Relaxed);
            }
            Err(reason) => self.stats.record_rejection(reason),
        }
        result
    }

    async fn submit_once_inner(&self, payload: &[u8], auth_key: Option<&str>) -> IngestResult<Accepted> {
        self.authenticate(auth_key)?;
        let _token = self.governor.admit(AdmissionSource::OneShot).await?;
        self.check_size(payload)?;

        let sample = MetricSubmission::parse(payload)?.into_sample(now_millis())?;
        self.engine.enqueue(vec![BatchEntry::one_shot(sample)])?;
        Ok(Accepted::Created { samples: 1 })
    }

    /// Authenticate and register a streaming connection
    pub fn on_connect(&self, auth_key: Option<&str>) -> IngestResult<ConnectionHandle> {
        let result = self.connect_inner(auth_key);
        if let Err(reason) = &result {
            self.stats.record_rejection(reason);
        }
        result
    }

    fn connect_inner(&self, auth_key: Option<&str>) -> IngestResult<ConnectionHandle> {
        self.authenticate(auth_key)?;

        let id = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        self.governor.register(id)?;
        let ack_receiver = self.acks.register(id);
        self.stats.connections_opened.fetch_add(1, Ordering::Relaxed);
        info!("{} opened", id);

        Ok(ConnectionHandle {
            id,
            state: ConnectionState::Open,
            sequence_counter: 0,
            last_client_seq: None,
            ack_receiver: Some(ack_receiver),
            governor: self.governor.clone(),
            acks: self.acks.clone(),
            stats: self.stats.clone(),
        })
    }

    /// Accept one stream frame. Returns as soon as the frame is buffered.
    pub async fn on_message(&self, handle: &mut ConnectionHandle, payload: &[u8]) -> IngestResult<Accepted> {
        let result = self.message_inner(handle, payload).await;
        match &result {
            Ok(_) => {
                self.stats.frames_accepted.fetch_add(1, Ordering::Relaxed);
            }
            Err(reason) => self.stats.record_rejection(reason),
        }
        result
    }

    async fn message_inner(&self, handle: &mut ConnectionHandle, payload: &[u8]) -> IngestResult<Accepted> {
        if matches!(handle.state, ConnectionState::Closing | ConnectionState::Closed) {
            return Err(RejectionReason::malformed("connection is closing"));
        }

        let _token = self.governor.admit(AdmissionSource::Stream(handle.id)).await?;
        self.check_size(payload)?;

        let frame = StreamFrame::parse(payload)?;
        if let Some(last) = handle.last_client_seq {
            if frame.seq <= last {
                return Err(RejectionReason::malformed(format!(
                    "seq {} is not greater than last accepted seq {}",
                    frame.seq, last
                )));
            }
        }
        let samples = frame.to_samples()?;

        let seq = handle.sequence_counter + 1;
        let origin = StreamOrigin {
            connection: handle.id,
            seq,
        };
        let entries = samples
            .into_iter()
            .map(|sample| BatchEntry::streamed(sample, origin))
            .collect();

        // Tracked before enqueue so a flush can never outrun it
        self.acks.track(handle.id, seq, frame.seq, frame.sent_at);
        if let Err(reason) = self.engine.enqueue(entries) {
            self.acks.untrack(handle.id, seq);
            return Err(reason);
        }

        handle.sequence_counter = seq;
        handle.last_client_seq = Some(frame.seq);
        handle.state = ConnectionState::Active;

        Ok(Accepted::Queued {
            seq,
            client_seq: frame.seq,
        })
    }

    /// Close a connection explicitly; equivalent to dropping the handle
    pub fn on_close(&self, mut handle: ConnectionHandle) {
        handle.begin_close();
        handle.release();
    }

    /// Best-effort client `seq` for NACK frames when full parsing failed
    pub fn peek_seq(payload: &[u8]) -> Option<u64> {
        #[derive(serde::Deserialize)]
        struct SeqOnly {
            seq: u64,
        }
        serde_json::from_slice::<SeqOnly>(payload).ok().map(|s| s.seq)
    }

    pub fn governor(&self) -> &Arc<AdmissionGovernor> {
        &self.governor
    }

    pub fn engine(&self) -> &Arc<BatchingEngine> {
        &self.engine
    }

    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    fn check_size(&self, payload: &[u8]) -> IngestResult<()> {
        if payload.len() > self.max_payload_bytes {
            return Err(RejectionReason::malformed(format!(
                "payload of {} bytes exceeds limit of {}",
                payload.len(),
                self.max_payload_bytes
            )));
        }
        Ok(())
    }
}

// Compares every byte regardless of where the first mismatch is
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
