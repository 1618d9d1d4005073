//! Gateway counters

use metricgate_core::RejectionReason;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters, shared through `Arc` by every pipeline component
#[derive(Debug, Default)]
pub struct GatewayStats {
    pub submissions_accepted: AtomicU64,
    pub frames_accepted: AtomicU64,
    pub samples_enqueued: AtomicU64,

    pub rejected_unauthorized: AtomicU64,
    pub rejected_malformed: AtomicU64,
    pub rejected_invalid_value: AtomicU64,
    pub rejected_overloaded: AtomicU64,
    pub rejected_buffer_full: AtomicU64,

    pub batches_flushed: AtomicU64,
    pub samples_flushed: AtomicU64,
    pub batches_dropped: AtomicU64,
    pub samples_dropped: AtomicU64,
    pub flush_retries: AtomicU64,

    pub acks_sent: AtomicU64,
    pub acks_discarded: AtomicU64,

    pub connections_opened: AtomicU64,
    pub connections_closed: AtomicU64,
}

impl GatewayStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a refused submission, connection or message under its reason
    pub fn record_rejection(&self, reason: &RejectionReason) {
        let counter = match reason {
            RejectionReason::Unauthorized => &self.rejected_unauthorized,
            RejectionReason::Malformed(_) => &self.rejected_malformed,
            RejectionReason::InvalidValue(_) => &self.rejected_invalid_value,
            RejectionReason::Overloaded => &self.rejected_overloaded,
            RejectionReason::BufferFull => &self.rejected_buffer_full,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flushed(&self, samples: usize) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.samples_flushed.fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, samples: usize) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
        self.samples_dropped.fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn open_connections(&self) -> u64 {
        let opened = self.connections_opened.load(Ordering::Relaxed);
        let closed = self.connections_closed.load(Ordering::Relaxed);
        opened.saturating_sub(closed)
    }

    /// Point-in-time copy suitable for serialisation
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        StatsSnapshot {
            submissions_accepted: load(&self.submissions_accepted),
            frames_accepted: load(&self.frames_accepted),
            samples_enqueued: load(&self.samples_enqueued),
            rejected: RejectionCounts {
                unauthorized: load(&self.rejected_unauthorized),
                malformed: load(&self.rejected_malformed),
                invalid_value: load(&self.rejected_invalid_value),
                overloaded: load(&self.rejected_overloaded),
                buffer_full: load(&self.rejected_buffer_full),
            },
            batches_flushed: load(&self.batches_flushed),
            samples_flushed: load(&self.samples_flushed),
            batches_dropped: load(&self.batches_dropped),
            samples_dropped: load(&self.samples_dropped),
            flush_retries: load(&self.flush_retries),
            acks_sent: load(&self.acks_sent),
            acks_discarded: load(&self.acks_discarded),
            open_connections: self.open_connections(),
        }
    }
}

/// Serialisable view of [`GatewayStats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submissions_accepted: u64,
    pub frames_accepted: u64,
    pub samples_enqueued: u64,
    pub rejected: RejectionCounts,
    pub batches_flushed: u64,
    pub samples_flushed: u64,
    pub batches_dropped: u64,
    pub samples_dropped: u64,
    pub flush_retries: u64,
    pub acks_sent: u64,
    pub acks_discarded: u64,
    pub open_connections: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionCounts {
    pub unauthorized: u64,
    pub malformed: u64,
    pub invalid_value: u64,
    pub overloaded: u64,
    pub buffer_full: u64,
}

impl RejectionCounts {
    pub fn total(&self) -> u64 {
        self.unauthorized + self.malformed + self.invalid_value + self.overloaded + self.buffer_full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_counted_by_reason() {
        let stats = GatewayStats::new();
        stats.record_rejection(&RejectionReason::Unauthorized);
        stats.record_rejection(&RejectionReason::malformed("bad json"));
        stats.record_rejection(&RejectionReason::malformed("missing seq"));
        stats.record_rejection(&RejectionReason::BufferFull);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.rejected.unauthorized, 1);
        assert_eq!(snapshot.rejected.malformed, 2);
        assert_eq!(snapshot.rejected.buffer_full, 1);
        assert_eq!(snapshot.rejected.total(), 4);
    }

    #[test]
    fn test_open_connections_never_underflows() {
        let stats = GatewayStats::new();
        stats.connections_closed.fetch_add(1, Ordering::Relaxed);
        assert_eq!(stats.open_connections(), 0);

        stats.connections_opened.fetch_add(3, Ordering::Relaxed);
        assert_eq!(stats.open_connections(), 2);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = GatewayStats::new();
        stats.record_flushed(10);
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["batches_flushed"], 1);
        assert_eq!(json["samples_flushed"], 10);
        assert_eq!(json["rejected"]["overloaded"], 0);
    }
}
