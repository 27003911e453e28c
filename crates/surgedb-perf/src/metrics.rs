//! Latency and error accumulation for a run.

use crate::workload::OperationKind;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw samples of one run.
///
/// Latencies are seconds, one entry per successful call.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    pub search_latencies: Vec<f64>,
    pub insert_latencies: Vec<f64>,
    pub search_errors: u64,
    pub insert_errors: u64,
}

impl RunMetrics {
    #[must_use]
    pub fn latencies(&self, kind: OperationKind) -> &[f64] {
        match kind {
            OperationKind::Search => &self.search_latencies,
            OperationKind::Insert => &self.insert_latencies,
        }
    }

    #[must_use]
    pub fn errors(&self, kind: OperationKind) -> u64 {
        match kind {
            OperationKind::Search => self.search_errors,
            OperationKind::Insert => self.insert_errors,
        }
    }
}

/// Thread-safe accumulator shared by all workers of one run.
///
/// The lock is held only for a push or an increment.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    inner: Mutex<RunMetrics>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful call that took `elapsed_secs`.
    pub fn record_success(&self, kind: OperationKind, elapsed_secs: f64) {
        let mut inner = self.inner.lock();
        match kind {
            OperationKind::Search => inner.search_latencies.push(elapsed_secs),
            OperationKind::Insert => inner.insert_latencies.push(elapsed_secs),
        }
    }

    /// Record a failed call.
    pub fn record_error(&self, kind: OperationKind) {
        let mut inner = self.inner.lock();
        match kind {
            OperationKind::Search => inner.search_errors += 1,
            OperationKind::Insert => inner.insert_errors += 1,
        }
    }

    /// Copy of the current samples.
    #[must_use]
    pub fn snapshot(&self) -> RunMetrics {
        self.inner.lock().clone()
    }

    #[must_use]
    pub fn error_counts(&self) -> ErrorCounts {
        let inner = self.inner.lock();
        ErrorCounts {
            search: inner.search_errors,
            insert: inner.insert_errors,
        }
    }

    /// Summarize one operation kind over a wall-clock window.
    #[must_use]
    pub fn summarize(&self, kind: OperationKind, wall: Duration) -> OperationSummary {
        let samples = self.inner.lock().latencies(kind).to_vec();
        OperationSummary {
            stats: SummaryStats::from_latencies(&samples, wall),
        }
    }
}

/// Derived statistics for one operation kind, all latencies in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub count: usize,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub qps: f64,
}

impl SummaryStats {
    /// Compute from latencies in seconds. `None` when there are no samples.
    #[must_use]
    pub fn from_latencies(latencies_secs: &[f64], wall: Duration) -> Option<Self> {
        if latencies_secs.is_empty() {
            return None;
        }

        let mut sorted: Vec<f64> = latencies_secs.iter().map(|s| s * 1000.0).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let avg_ms = sorted.iter().sum::<f64>() / count as f64;
        let wall_secs = wall.as_secs_f64();
        let qps = if wall_secs > 0.0 {
            count as f64 / wall_secs
        } else {
            0.0
        };

        Some(Self {
            count,
            avg_ms,
            p50_ms: percentile(&sorted, 50.0)?,
            p95_ms: percentile(&sorted, 95.0)?,
            p99_ms: percentile(&sorted, 99.0)?,
            min_ms: *sorted.first()?,
            max_ms: *sorted.last()?,
            qps,
        })
    }
}

/// Nearest-rank percentile over a sorted slice, `None` when it is empty.
///
/// Picks `sorted[floor(p / 100 * (n - 1))]`; no interpolation.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let index = ((p / 100.0) * last as f64) as usize;
    sorted.get(index.min(last)).copied()
}

/// Stats for one kind; serializes to `{}` when nothing was recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationSummary {
    #[serde(flatten)]
    pub stats: Option<SummaryStats>,
}

impl OperationSummary {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stats.is_none()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.stats.as_ref().map_or(0, |s| s.count)
    }
}

/// Failed calls per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCounts {
    pub search: u64,
    pub insert: u64,
}

impl ErrorCounts {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.search + self.insert
    }
}
