use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    pages_fetched: AtomicU64,
    records_fetched: AtomicU64,
    page_retries: AtomicU64,
    chunks_committed: AtomicU64,
    chunks_failed: AtomicU64,
    files_updated: AtomicU64,
    files_moved: AtomicU64,
    compensations: AtomicU64,
    compensation_failures: AtomicU64,
    anomalies: AtomicU64,
}

/// Cheap, cloneable counters shared by every component of one client.
#[derive(Debug, Clone, Default)]
pub struct SyncMetrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub pages_fetched: u64,
    pub records_fetched: u64,
    pub page_retries: u64,
    pub chunks_committed: u64,
    pub chunks_failed: u64,
    pub files_updated: u64,
    pub files_moved: u64,
    pub compensations: u64,
    pub compensation_failures: u64,
    pub anomalies: u64,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_page(&self, records: usize) {
        self.inner.pages_fetched.fetch_add(1, Ordering::Relaxed);
        self.inner
            .records_fetched
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn increment_page_retries(&self, count: u64) {
        self.inner.page_retries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_chunk_committed(&self, files: usize) {
        self.inner.chunks_committed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .files_updated
            .fetch_add(files as u64, Ordering::Relaxed);
    }

    pub fn record_chunk_failed(&self) {
        self.inner.chunks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_files_moved(&self, count: u64) {
        self.inner.files_moved.fetch_add(count, Ordering::Relaxed);
    }

    /// Counts parent files put back after a failed derived-side move, and
    /// those that could not be put back.
    pub fn record_compensation(&self, restored: u64, unrestored: u64) {
        self.inner.compensations.fetch_add(restored, Ordering::Relaxed);
        self.inner
            .compensation_failures
            .fetch_add(unrestored, Ordering::Relaxed);
    }

    pub fn increment_anomalies(&self, count: u64) {
        self.inner.anomalies.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pages_fetched: self.inner.pages_fetched.load(Ordering::Relaxed),
            records_fetched: self.inner.records_fetched.load(Ordering::Relaxed),
            page_retries: self.inner.page_retries.load(Ordering::Relaxed),
            chunks_committed: self.inner.chunks_committed.load(Ordering::Relaxed),
            chunks_failed: self.inner.chunks_failed.load(Ordering::Relaxed),
            files_updated: self.inner.files_updated.load(Ordering::Relaxed),
            files_moved: self.inner.files_moved.load(Ordering::Relaxed),
            compensations: self.inner.compensations.load(Ordering::Relaxed),
            compensation_failures: self.inner.compensation_failures.load(Ordering::Relaxed),
            anomalies: self.inner.anomalies.load(Ordering::Relaxed),
        }
    }
}
