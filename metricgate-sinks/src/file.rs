//! Append-only JSON lines sink

use async_trait::async_trait;
use lru::LruCache;
use metricgate_core::{Batch, MetricSample};
use metricgate_interfaces::{MetricSink, SinkError, SinkHealth};
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Serialize)]
struct SampleLine<'a> {
    batch_id: Uuid,
    #[serde(flatten)]
    sample: &'a MetricSample,
}

/// Appends one JSON object per sample to a file.
///
/// Ids of recently written batches are kept in an LRU so a replayed flush is
/// not written twice. A replay older than the window is written again.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    // also serialises writers so lines of one batch stay contiguous
    written: Mutex<LruCache<Uuid, ()>>,
}

impl FileSink {
    pub fn new(path: impl AsRef<Path>, dedupe_window: usize) -> Self {
        let window = NonZeroUsize::new(dedupe_window).unwrap_or(NonZeroUsize::MIN);
        Self {
            path: path.as_ref().to_path_buf(),
            written: Mutex::new(LruCache::new(window)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn render(batch: &Batch) -> Result<Vec<u8>, SinkError> {
        let mut buf = Vec::with_capacity(batch.len() * 128);
        for sample in batch.samples() {
            let line = SampleLine {
                batch_id: batch.id(),
                sample,
            };
            serde_json::to_writer(&mut buf, &line)
                .map_err(|e| SinkError::fatal(format!("Failed to serialise sample: {}", e)))?;
            buf.push(b'\n');
        }
        Ok(buf)
    }

    async fn append(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl MetricSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn flush(&self, batch: &Batch) -> Result<(), SinkError> {
        let mut written = self.written.lock().await;
        if written.contains(&batch.id()) {
            tracing::debug!("Batch {} already written to {}", batch.id(), self.path.display());
            return Ok(());
        }

        let bytes = Self::render(batch)?;
        self.append(&bytes).await.map_err(|e| {
            SinkError::transient(format!("Failed to append to {}: {}", self.path.display(), e))
        })?;

        written.put(batch.id(), ());
        Ok(())
    }

    async fn health_check(&self) -> SinkHealth {
        match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) if fs::metadata(parent).await.is_err() => SinkHealth::Degraded {
                reason: format!("{} does not exist yet", parent.display()),
            },
            _ => SinkHealth::Healthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricgate_core::{BatchEntry, FlushTrigger, MetricType, ServerId};

    fn batch(values: &[f64]) -> Batch {
        let entries = values
            .iter()
            .map(|v| {
                BatchEntry::one_shot(
                    MetricSample::new(ServerId::Named("web-1".into()), MetricType::Network, *v, "Mbps", 1_700_000_000_000)
                        .unwrap(),
                )
            })
            .collect();
        Batch::new(entries, FlushTrigger::Time)
    }

    #[tokio::test]
    async fn test_writes_one_line_per_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("samples.jsonl");
        let sink = FileSink::new(&path, 8);
        let batch = batch(&[10.0, 20.5]);

        sink.flush(&batch).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["batch_id"], batch.id().to_string());
        assert_eq!(lines[0]["server_id"], "web-1");
        assert_eq!(lines[0]["metric_type"], "network");
        assert_eq!(lines[1]["value"], 20.5);
    }

    #[tokio::test]
    async fn test_replayed_flush_is_not_duplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.jsonl");
        let sink = FileSink::new(&path, 8);
        let batch = batch(&[1.0]);

        sink.flush(&batch).await.unwrap();
        sink.flush(&batch).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn test_unwritable_path_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be opened for appending
        let sink = FileSink::new(dir.path(), 8);

        let err = sink.flush(&batch(&[1.0])).await.unwrap_err();
        assert!(matches!(err, SinkError::Transient { .. }));
    }

    #[tokio::test]
    async fn test_health_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("missing").join("samples.jsonl"), 8);
        assert!(matches!(sink.health_check().await, SinkHealth::Degraded { .. }));

        let sink = FileSink::new(dir.path().join("samples.jsonl"), 8);
        assert_eq!(sink.health_check().await, SinkHealth::Healthy);
    }
}
