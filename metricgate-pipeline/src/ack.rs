//! Acknowledgement and sequencing tracker

use crate::stats::GatewayStats;
use metricgate_core::{now_millis, AckFrame, AckRecord, Batch, ConnectionId, StreamOrigin};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy)]
struct PendingAck {
    client_seq: u64,
    sent_at: i64,
    received_at: i64,
}

#[derive(Debug)]
struct ConnectionAcks {
    sender: mpsc::UnboundedSender<AckFrame>,
    // keyed by gateway sequence
    pending: BTreeMap<u64, PendingAck>,
}

/// Routes ACK frames for durably flushed stream frames back to their
/// connection.
///
/// Each registered connection gets its own channel; the connection's writer
/// drains it. Batches are flushed one at a time and entries keep submission
/// order, so ACKs on one channel are emitted in sequence order.
#[derive(Debug)]
pub struct AckTracker {
    connections: Mutex<HashMap<ConnectionId, ConnectionAcks>>,
    stats: Arc<GatewayStats>,
}

impl AckTracker {
    pub fn new(stats: Arc<GatewayStats>) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            stats,
        }
    }

    /// Start tracking a connection and return the receiving end of its ACK channel
    pub fn register(&self, connection: ConnectionId) -> mpsc::UnboundedReceiver<AckFrame> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.connections.lock().insert(
            connection,
            ConnectionAcks {
                sender,
                pending: BTreeMap::new(),
            },
        );
        receiver
    }

    /// Forget a connection. ACKs for its outstanding frames will be discarded.
    pub fn deregister(&self, connection: ConnectionId) {
        if let Some(acks) = self.connections.lock().remove(&connection) {
            if !acks.pending.is_empty() {
                debug!(
                    "{} closed with {} unacknowledged frame(s)",
                    connection,
                    acks.pending.len()
                );
            }
        }
    }

    /// Record an admitted frame awaiting durable acceptance
    pub fn track(&self, connection: ConnectionId, seq: u64, client_seq: u64, sent_at: i64) {
        if let Some(acks) = self.connections.lock().get_mut(&connection) {
            acks.pending.insert(
                seq,
                PendingAck {
                    client_seq,
                    sent_at,
                    received_at: now_millis(),
                },
            );
        }
    }

    /// Withdraw a tracked frame that never made it into the buffer
    pub fn untrack(&self, connection: ConnectionId, seq: u64) {
        if let Some(acks) = self.connections.lock().get_mut(&connection) {
            acks.pending.remove(&seq);
        }
    }

    /// Emit one ACK per stream frame contained in a flushed batch
    pub fn on_flushed(&self, batch: &Batch) {
        let ack_at = now_millis();
        let mut connections = self.connections.lock();

        for origin in frame_origins(batch) {
            let Some(acks) = connections.get_mut(&origin.connection) else {
                self.stats.acks_discarded.fetch_add(1, Ordering::Relaxed);
                continue;
            };
            let Some(pending) = acks.pending.remove(&origin.seq) else {
                continue;
            };

            let record = AckRecord {
                seq: pending.client_seq,
                sent_at: pending.sent_at,
                ack_at,
            };
            trace!(
                "Acknowledging seq {} on {} after {}ms",
                record.seq,
                origin.connection,
                ack_at - pending.received_at
            );

            if acks.sender.send(AckFrame::from(record)).is_ok() {
                self.stats.acks_sent.fetch_add(1, Ordering::Relaxed);
            } else {
                self.stats.acks_discarded.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Clear pending state for frames in a dropped batch without acknowledging them
    pub fn on_dropped(&self, batch: &Batch) {
        let mut connections = self.connections.lock();
        for origin in frame_origins(batch) {
            if let Some(acks) = connections.get_mut(&origin.connection) {
                acks.pending.remove(&origin.seq);
            }
        }
    }

    /// Frames still waiting for their batch to flush
    pub fn pending_count(&self, connection: ConnectionId) -> usize {
        self.connections
            .lock()
            .get(&connection)
            .map(|acks| acks.pending.len())
            .unwrap_or(0)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }
}

// Samples of one frame are adjacent in a batch; collapse them to one origin.
fn frame_origins(batch: &Batch) -> Vec<StreamOrigin> {
    let mut origins: Vec<StreamOrigin> = Vec::new();
    for origin in batch.entries().iter().filter_map(|entry| entry.origin) {
        if origins.last() != Some(&origin) {
            origins.push(origin);
        }
    }
    origins
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricgate_core::{BatchEntry, FlushTrigger, StreamFrame};

    fn frame_entries(connection: ConnectionId, seq: u64, client_seq: u64) -> Vec<BatchEntry> {
        let frame = StreamFrame {
            seq: client_seq,
            server_name: "ws-vu-1".to_string(),
            cpu_usage: 40.0,
            memory_usage: 60.0,
            sent_at: 1_700_000_000_000 + client_seq as i64,
        };
        frame
            .to_samples()
            .unwrap()
            .into_iter()
            .map(|sample| BatchEntry::streamed(sample, StreamOrigin { connection, seq }))
            .collect()
    }

    fn tracker() -> (AckTracker, Arc<GatewayStats>) {
        let stats = Arc::new(GatewayStats::new());
        (AckTracker::new(stats.clone()), stats)
    }

    #[test]
    fn test_one_ack_per_frame_in_order() {
        let (tracker, stats) = tracker();
        let conn = ConnectionId(1);
        let mut rx = tracker.register(conn);

        let mut entries = Vec::new();
        for seq in 1..=3 {
            tracker.track(conn, seq, seq * 10, 1_700_000_000_000 + (seq * 10) as i64);
            entries.extend(frame_entries(conn, seq, seq * 10));
        }
        tracker.on_flushed(&Batch::new(entries, FlushTrigger::Size));

        let acks: Vec<AckFrame> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(acks.iter().map(|a| a.ack_seq).collect::<Vec<_>>(), vec![10, 20, 30]);
        assert_eq!(acks[0].sent_at, 1_700_000_000_010);
        assert_eq!(stats.acks_sent.load(Ordering::Relaxed), 3);
        assert_eq!(tracker.pending_count(conn), 0);
    }

    #[test]
    fn test_replayed_batch_does_not_ack_twice() {
        let (tracker, _) = tracker();
        let conn = ConnectionId(1);
        let mut rx = tracker.register(conn);
        tracker.track(conn, 1, 1, 0);

        let batch = Batch::new(frame_entries(conn, 1, 1), FlushTrigger::Time);
        tracker.on_flushed(&batch);
        tracker.on_flushed(&batch);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_batch_clears_without_ack() {
        let (tracker, _) = tracker();
        let conn = ConnectionId(2);
        let mut rx = tracker.register(conn);
        tracker.track(conn, 1, 1, 0);

        tracker.on_dropped(&Batch::new(frame_entries(conn, 1, 1), FlushTrigger::Size));

        assert_eq!(tracker.pending_count(conn), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_acks_for_closed_connection_are_discarded() {
        let (tracker, stats) = tracker();
        let conn = ConnectionId(3);
        let _rx = tracker.register(conn);
        tracker.track(conn, 1, 1, 0);
        tracker.deregister(conn);

        tracker.on_flushed(&Batch::new(frame_entries(conn, 1, 1), FlushTrigger::Size));

        assert_eq!(stats.acks_sent.load(Ordering::Relaxed), 0);
        assert_eq!(stats.acks_discarded.load(Ordering::Relaxed), 1);
        assert_eq!(tracker.connection_count(), 0);
    }

    #[test]
    fn test_dropped_receiver_counts_as_discarded() {
        let (tracker, stats) = tracker();
        let conn = ConnectionId(4);
        drop(tracker.register(conn));
        tracker.track(conn, 1, 1, 0);

        tracker.on_flushed(&Batch::new(frame_entries(conn, 1, 1), FlushTrigger::Size));
        assert_eq!(stats.acks_discarded.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_one_shot_entries_are_ignored() {
        let (tracker, stats) = tracker();
        let sample = frame_entries(ConnectionId(9), 1, 1).remove(0).sample;
        tracker.on_flushed(&Batch::new(vec![BatchEntry::one_shot(sample)], FlushTrigger::Size));

        assert_eq!(stats.acks_sent.load(Ordering::Relaxed), 0);
        assert_eq!(stats.acks_discarded.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_untrack_withdraws_frame() {
        let (tracker, _) = tracker();
        let conn = ConnectionId(5);
        let _rx = tracker.register(conn);
        tracker.track(conn, 1, 1, 0);
        tracker.untrack(conn, 1);
        assert_eq!(tracker.pending_count(conn), 0);
    }
}
