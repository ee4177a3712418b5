//! Batch metrics.
//!
//! Counters are atomics; duration samples sit behind a mutex and feed the
//! P50/P95 figures of a snapshot.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Maximum number of duration samples to keep in memory.
const MAX_DURATION_SAMPLES: usize = 1000;

/// Metrics collector shared across batches.
#[derive(Debug)]
pub struct BatchMetrics {
    /// Jobs moved to `processing`.
    pub jobs_started: AtomicU64,
    /// Jobs that ended `completed`.
    pub jobs_completed: AtomicU64,
    /// Jobs that ended `error`.
    pub jobs_failed: AtomicU64,
    /// Failed jobs whose backend produced nothing.
    pub artifacts_missing: AtomicU64,
    /// Input bytes written into staging.
    pub bytes_staged: AtomicU64,
    /// Batches run to the end.
    pub batches_run: AtomicU64,
    duration_samples: Mutex<Vec<Duration>>,
}

impl BatchMetrics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self {
            jobs_started: AtomicU64::new(0),
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            artifacts_missing: AtomicU64::new(0),
            bytes_staged: AtomicU64::new(0),
            batches_run: AtomicU64::new(0),
            duration_samples: Mutex::new(Vec::with_capacity(MAX_DURATION_SAMPLES)),
        }
    }

    /// Record a job start and the bytes staged for it.
    pub fn record_started(&self, staged_bytes: u64) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
        self.bytes_staged.fetch_add(staged_bytes, Ordering::Relaxed);
    }

    /// Record a completed job.
    pub fn record_completed(&self, duration: Duration) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        self.add_duration_sample(duration);
    }

    /// Record a failed job.
    pub fn record_failed(&self, duration: Duration, artifact_missing: bool) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        if artifact_missing {
            self.artifacts_missing.fetch_add(1, Ordering::Relaxed);
        }
        self.add_duration_sample(duration);
    }

    /// Record the end of a batch.
    pub fn record_batch(&self) {
        self.batches_run.fetch_add(1, Ordering::Relaxed);
    }

    fn add_duration_sample(&self, duration: Duration) {
        if let Ok(mut samples) = self.duration_samples.lock() {
            if samples.len() >= MAX_DURATION_SAMPLES {
                samples.remove(0);
            }
            samples.push(duration);
        }
    }

    /// Current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut durations = self
            .duration_samples
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        durations.sort();

        let percentile = |p: usize| {
            durations
                .get(durations.len() * p / 100)
                .map(|d| d.as_millis() as u64)
        };

        MetricsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            artifacts_missing: self.artifacts_missing.load(Ordering::Relaxed),
            bytes_staged: self.bytes_staged.load(Ordering::Relaxed),
            batches_run: self.batches_run.load(Ordering::Relaxed),
            duration_p50_ms: percentile(50),
            duration_p95_ms: percentile(95),
            sample_count: durations.len() as u64,
        }
    }
}

impl Default for BatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`BatchMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    /// Jobs started.
    pub jobs_started: u64,
    /// Jobs completed.
    pub jobs_completed: u64,
    /// Jobs failed.
    pub jobs_failed: u64,
    /// Failed jobs with no artifact.
    pub artifacts_missing: u64,
    /// Input bytes staged.
    pub bytes_staged: u64,
    /// Batches run.
    pub batches_run: u64,
    /// P50 job duration in milliseconds.
    pub duration_p50_ms: Option<u64>,
    /// P95 job duration in milliseconds.
    pub duration_p95_ms: Option<u64>,
    /// Number of duration samples.
    pub sample_count: u64,
}
