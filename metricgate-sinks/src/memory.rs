//! In-process sink for development and tests

use async_trait::async_trait;
use metricgate_core::{Batch, MetricSample};
use metricgate_interfaces::{MetricSink, SinkError};
use parking_lot::Mutex;
use std::collections::HashSet;
use uuid::Uuid;

/// Keeps every accepted batch in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Batch>>,
    seen: Mutex<HashSet<Uuid>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted batches in flush order
    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().clone()
    }

    /// All accepted samples in flush order
    pub fn samples(&self) -> Vec<MetricSample> {
        self.batches.lock().iter().flat_map(|batch| batch.samples().cloned()).collect()
    }

    pub fn sample_count(&self) -> usize {
        self.batches.lock().iter().map(Batch::len).sum()
    }
}

#[async_trait]
impl MetricSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn flush(&self, batch: &Batch) -> Result<(), SinkError> {
        if self.seen.lock().insert(batch.id()) {
            self.batches.lock().push(batch.clone());
        }
        Ok(())
    }
}
