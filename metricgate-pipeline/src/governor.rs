//! Admission and rate governance
//!
//! The governor is the only place that decides whether the gateway takes on
//! more work. It is checked after authentication and before any payload is
//! parsed, so shedding load costs O(1).

use metricgate_config::AdmissionConfig;
use metricgate_core::{ConnectionId, IngestResult, RejectionReason};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::Instant;
use tracing::{debug, info};

/// Who is asking for admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionSource {
    /// A single HTTP submission
    OneShot,
    /// One message on a registered streaming connection
    Stream(ConnectionId),
}

/// Proof of admission; the in-flight slot is released when it is dropped
#[derive(Debug)]
pub struct AdmissionToken {
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    fn new(max_tokens: u32, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens as f64,
            last_refill: Instant::now(),
            max_tokens: max_tokens as f64,
            refill_rate,
        }
    }

    fn try_consume(&mut self, tokens: f64) -> bool {
        self.refill();

        if self.tokens >= tokens {
            self.tokens -= tokens;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }
}

/// Global in-flight ceiling, connection ceiling and per-connection rate window.
///
/// Created once at startup and shared through `Arc`; [`close`](Self::close)
/// makes every later admission fail.
#[derive(Debug)]
pub struct AdmissionGovernor {
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    admission_timeout: Duration,
    max_connections: usize,
    rate_per_second: f64,
    burst: u32,
    connections: Mutex<HashMap<ConnectionId, TokenBucket>>,
    closed: AtomicBool,
}

impl AdmissionGovernor {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.max_in_flight)),
            max_in_flight: config.max_in_flight,
            admission_timeout: config.admission_timeout,
            max_connections: config.max_connections,
            rate_per_second: config.per_connection_rate,
            burst: config.per_connection_burst,
            connections: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Reserve a connection slot and start its rate window
    pub fn register(&self, connection: ConnectionId) -> IngestResult<()> {
        if self.is_closed() {
            return Err(RejectionReason::Overloaded);
        }

        let mut connections = self.connections.lock();
        if connections.len() >= self.max_connections {
            debug!("Connection ceiling of {} reached, rejecting {}", self.max_connections, connection);
            return Err(RejectionReason::Overloaded);
        }
        connections.insert(connection, TokenBucket::new(self.burst, self.rate_per_second));
        Ok(())
    }

    /// Release a connection slot. Unknown ids are ignored.
    pub fn deregister(&self, connection: ConnectionId) {
        self.connections.lock().remove(&connection);
    }

    /// Admit one unit of work or reject with `Overloaded`.
    ///
    /// Stream messages are first checked against their connection's rate
    /// window. The in-flight wait never exceeds the configured timeout.
    pub async fn admit(&self, source: AdmissionSource) -> IngestResult<AdmissionToken> {
        if self.is_closed() {
            return Err(RejectionReason::Overloaded);
        }

        if let AdmissionSource::Stream(connection) = source {
            let mut connections = self.connections.lock();
            let within_rate = connections
                .get_mut(&connection)
                .map(|bucket| bucket.try_consume(1.0))
                .unwrap_or(false);
            if !within_rate {
                debug!("Rate window exceeded for {}", connection);
                return Err(RejectionReason::Overloaded);
            }
        }

        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::Closed) => return Err(RejectionReason::Overloaded),
            Err(TryAcquireError::NoPermits) if self.admission_timeout.is_zero() => {
                return Err(RejectionReason::Overloaded)
            }
            Err(TryAcquireError::NoPermits) => {
                match tokio::time::timeout(self.admission_timeout, self.permits.clone().acquire_owned()).await {
                    Ok(Ok(permit)) => permit,
                    Ok(Err(_)) | Err(_) => return Err(RejectionReason::Overloaded),
                }
            }
        };

        Ok(AdmissionToken { _permit: permit })
    }

    /// Reject all further admissions and wake any waiters
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Admission governor closed");
            self.permits.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Units of work currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.max_in_flight.saturating_sub(self.permits.available_permits())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }
}
