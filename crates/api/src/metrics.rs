use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Process-local counters for the HTTP surface.
#[derive(Debug, Default)]
pub struct Metrics {
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Timing (in microseconds)
    total_ingest_time_us: AtomicU64,
    total_query_time_us: AtomicU64,

    documents_ingested: AtomicUsize,
    queries_answered: AtomicUsize,
    chunks_merged: AtomicUsize,
    chunks_failed: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_ingest(&self, duration: Duration, merged: usize, failed: usize) {
        self.total_ingest_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_merged.fetch_add(merged, Ordering::Relaxed);
        self.chunks_failed.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn record_query(&self, duration: Duration) {
        self.total_query_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.queries_answered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            queries_answered: self.queries_answered.load(Ordering::Relaxed),
            chunks_merged: self.chunks_merged.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            avg_ingest_time_ms: avg_time_ms(&self.total_ingest_time_us, &self.documents_ingested),
            avg_query_time_ms: avg_time_ms(&self.total_query_time_us, &self.queries_answered),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    let count = count.load(Ordering::Relaxed) as f64;
    if count > 0.0 {
        total / count / 1000.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub documents_ingested: usize,
    pub queries_answered: usize,
    pub chunks_merged: usize,
    pub chunks_failed: usize,
    pub avg_ingest_time_ms: f64,
    pub avg_query_time_ms: f64,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
