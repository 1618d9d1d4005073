//! In-memory buffering and batching engine
//!
//! Samples accumulate under a `parking_lot::Mutex` until either `batch_size`
//! samples are waiting or the oldest one is `flush_interval` old. Sealing
//! happens under that lock and bumps a generation counter, so the size path
//! and the timer path can never seal the same samples twice. Sealed batches go
//! through an unbounded channel to a single flusher task, which retries
//! transient sink failures and then notifies the [`AckTracker`].
//!
//! `capacity` bounds everything not yet flushed (accumulating plus sealed);
//! the channel is therefore bounded in practice.

use crate::ack::AckTracker;
use crate::stats::GatewayStats;
use metricgate_config::BufferConfig;
use metricgate_core::{Batch, BatchEntry, FlushTrigger, IngestResult, RejectionReason};
use metricgate_interfaces::MetricSink;
use metricgate_resilience::{BackoffStrategy, RetryExecutor, RetryPolicy};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Runtime settings for the batching engine
#[derive(Debug, Clone)]
pub struct BufferSettings {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub capacity: usize,
    pub retry: RetryPolicy,
}

impl From<&BufferConfig> for BufferSettings {
    fn from(config: &BufferConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            flush_interval: config.flush_interval,
            capacity: config.capacity,
            retry: RetryPolicy {
                max_attempts: config.retry.max_attempts,
                initial_delay: config.retry.initial_delay,
                max_delay: config.retry.max_delay,
                backoff_strategy: BackoffStrategy::Exponential {
                    base: config.retry.multiplier,
                },
                jitter: config.retry.jitter,
            },
        }
    }
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self::from(&BufferConfig::default())
    }
}

#[derive(Debug)]
struct Accumulator {
    entries: Vec<BatchEntry>,
    oldest: Option<Instant>,
    generation: u64,
    // accumulating plus sealed-but-unflushed
    outstanding: usize,
    sealed_tx: Option<mpsc::UnboundedSender<Batch>>,
}

impl Accumulator {
    fn seal(&mut self, trigger: FlushTrigger) {
        self.generation += 1;
        self.oldest = None;
        if self.entries.is_empty() {
            return;
        }

        let batch = Batch::new(std::mem::take(&mut self.entries), trigger);
        debug!("Sealed batch {} ({} samples, trigger={})", batch.id(), batch.len(), trigger);
        if let Some(tx) = &self.sealed_tx {
            // The flusher only stops after the sender is dropped
            let _ = tx.send(batch);
        }
    }
}

struct EngineShared {
    settings: BufferSettings,
    state: Mutex<Accumulator>,
    wake_timer: Notify,
    sink: Arc<dyn MetricSink>,
    acks: Arc<AckTracker>,
    stats: Arc<GatewayStats>,
}

/// Batches admitted samples and delivers them to the sink
pub struct BatchingEngine {
    shared: Arc<EngineShared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    aborts: Vec<AbortHandle>,
}

impl BatchingEngine {
    /// Create the engine and spawn its timer and flusher tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        settings: BufferSettings,
        sink: Arc<dyn MetricSink>,
        acks: Arc<AckTracker>,
        stats: Arc<GatewayStats>,
    ) -> Self {
        let (sealed_tx, sealed_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(EngineShared {
            settings,
            state: Mutex::new(Accumulator {
                entries: Vec::new(),
                oldest: None,
                generation: 0,
                outstanding: 0,
                sealed_tx: Some(sealed_tx),
            }),
            wake_timer: Notify::new(),
            sink,
            acks,
            stats,
        });

        info!(
            "Starting batching engine: sink={}, batch_size={}, flush_interval={:?}, capacity={}",
            shared.sink.name(),
            shared.settings.batch_size,
            shared.settings.flush_interval,
            shared.settings.capacity
        );

        let timer = tokio::spawn(run_timer(shared.clone()));
        let flusher = tokio::spawn(run_flusher(shared.clone(), sealed_rx));

        Self {
            shared,
            aborts: vec![timer.abort_handle(), flusher.abort_handle()],
            tasks: Mutex::new(vec![timer, flusher]),
        }
    }

    /// Append the samples of one submission.
    ///
    /// The entries are appended atomically and therefore land in the same
    /// batch. Nothing is buffered when an error is returned.
    pub fn enqueue(&self, entries: Vec<BatchEntry>) -> IngestResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let count = entries.len();
        let settings = &self.shared.settings;

        let started_window = {
            let mut state = self.shared.state.lock();
            if state.sealed_tx.is_none() {
                return Err(RejectionReason::Overloaded);
            }
            if state.outstanding + count > settings.capacity {
                return Err(RejectionReason::BufferFull);
            }

            let started_window = state.entries.is_empty();
            if started_window {
                state.oldest = Some(Instant::now());
            }
            state.entries.extend(entries);
            state.outstanding += count;

            if state.entries.len() >= settings.batch_size {
                state.seal(FlushTrigger::Size);
                false
            } else {
                started_window
            }
        };

        self.shared.stats.samples_enqueued.fetch_add(count as u64, Ordering::Relaxed);
        if started_window {
            self.shared.wake_timer.notify_one();
        }
        Ok(())
    }

    /// Samples buffered or awaiting flush
    pub fn outstanding(&self) -> usize {
        self.shared.state.lock().outstanding
    }

    /// Samples not yet sealed into a batch
    pub fn accumulating(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().sealed_tx.is_none()
    }

    /// Stop accepting samples, seal the remainder as a drain batch and wait
    /// for the flusher to deliver everything already sealed
    pub async fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.sealed_tx.is_none() {
                return;
            }
            state.seal(FlushTrigger::Drain);
            state.sealed_tx = None;
        }
        self.shared.wake_timer.notify_one();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!("Batching engine task failed during shutdown: {}", e);
            }
        }
        info!("Batching engine drained");
    }

    /// [`shutdown`](Self::shutdown) bounded by `timeout`.
    ///
    /// When the drain does not finish in time the timer and flusher are
    /// aborted and every sample still outstanding is counted as dropped.
    /// Returns the number of abandoned samples.
    pub async fn shutdown_within(&self, timeout: Duration) -> usize {
        if tokio::time::timeout(timeout, self.shutdown()).await.is_ok() {
            return 0;
        }
        self.abort();

        let abandoned = std::mem::take(&mut self.shared.state.lock().outstanding);
        if abandoned > 0 {
            error!(
                "Shutdown timeout of {:?} elapsed, abandoning {} samples not delivered to sink {}",
                timeout,
                abandoned,
                self.shared.sink.name()
            );
            self.shared.stats.record_dropped(abandoned);
        }
        abandoned
    }

    /// Stop the timer and flusher tasks without waiting for them.
    ///
    /// Buffered and in-flight batches are neither flushed nor accounted for.
    pub fn abort(&self) {
        {
            let mut state = self.shared.state.lock();
            state.sealed_tx = None;
        }
        for handle in &self.aborts {
            handle.abort();
        }
    }
}

async fn run_timer(shared: Arc<EngineShared>) {
    loop {
        let (deadline, generation) = {
            let state = shared.state.lock();
            if state.sealed_tx.is_none() {
                return;
            }
            (state.oldest.map(|t| t + shared.settings.flush_interval), state.generation)
        };

        match deadline {
            None => shared.wake_timer.notified().await,
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        let mut state = shared.state.lock();
                        if state.generation == generation && !state.entries.is_empty() {
                            state.seal(FlushTrigger::Time);
                        }
                    }
                    _ = shared.wake_timer.notified() => {}
                }
            }
        }
    }
}

async fn run_flusher(shared: Arc<EngineShared>, mut sealed_rx: mpsc::UnboundedReceiver<Batch>) {
    let executor = RetryExecutor::new(shared.settings.retry.clone());

    while let Some(batch) = sealed_rx.recv().await {
        flush_batch(&shared, &executor, &batch).await;
        {
            let mut state = shared.state.lock();
            state.outstanding = state.outstanding.saturating_sub(batch.len());
        }
    }

    debug!("Flusher stopped");
}

async fn flush_batch(shared: &EngineShared, executor: &RetryExecutor, batch: &Batch) {
    let sink = shared.sink.as_ref();
    let stats = shared.stats.as_ref();

    let result = executor
        .execute(move |attempt| {
            if attempt > 1 {
                stats.flush_retries.fetch_add(1, Ordering::Relaxed);
            }
            sink.flush(batch)
        })
        .await;

    match result {
        Ok(()) => {
            debug!("Flushed batch {} ({} samples) to {}", batch.id(), batch.len(), sink.name());
            shared.stats.record_flushed(batch.len());
            shared.acks.on_flushed(batch);
        }
        Err(e) => {
            error!(
                "Dropped batch {} ({} samples, trigger={}) after {} attempt(s): {}",
                batch.id(),
                batch.len(),
                batch.trigger(),
                e.attempts(),
                e
            );
            shared.stats.record_dropped(batch.len());
            shared.acks.on_dropped(batch);
        }
    }
}

impl Drop for BatchingEngine {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut();
        if !tasks.is_empty() {
            warn!("Batching engine dropped without shutdown; unflushed samples are lost");
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}
