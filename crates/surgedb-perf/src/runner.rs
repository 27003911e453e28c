//! One end-to-end benchmark run: setup, timed window, summary.

use crate::client::HttpCaller;
use crate::config::{BenchConfig, FilterType, Mode, Quantization};
use crate::error::{BenchError, BenchResult};
use crate::metrics::{ErrorCounts, MetricsCollector, OperationSummary};
use crate::prefill::{recreate_collection, Prefiller};
use crate::worker::{Worker, WorkerStats};
use crate::workload::OperationKind;
use futures::future::join_all;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

/// Upper bound on one sleep of the deadline poll.
const DEADLINE_POLL: Duration = Duration::from_millis(500);

/// Result of a run: the config echo plus per-kind statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Wall-clock seconds from worker start to the last worker exiting
    pub duration_s: f64,
    pub mode: Mode,
    pub collection: String,
    pub dimensions: usize,
    pub distance_metric: String,
    pub quantization: Quantization,
    pub prefill: usize,
    pub concurrency: usize,
    pub search_k: usize,
    pub include_metadata: bool,
    pub filter_type: Option<FilterType>,
    pub search: OperationSummary,
    pub insert: OperationSummary,
    pub errors: ErrorCounts,
}

impl RunSummary {
    /// CSV-style table, one row per metric, `-` where a kind has no samples.
    #[must_use]
    pub fn render_table(&self) -> String {
        let mut out = String::from("metric,search,insert\n");
        let rows: [(&str, fn(&OperationSummary) -> Option<String>); 8] = [
            ("count", |s| s.stats.as_ref().map(|s| s.count.to_string())),
            ("qps", |s| s.stats.as_ref().map(|s| format!("{:.2}", s.qps))),
            ("avg_ms", |s| s.stats.as_ref().map(|s| format!("{:.2}", s.avg_ms))),
            ("p50_ms", |s| s.stats.as_ref().map(|s| format!("{:.2}", s.p50_ms))),
            ("p95_ms", |s| s.stats.as_ref().map(|s| format!("{:.2}", s.p95_ms))),
            ("p99_ms", |s| s.stats.as_ref().map(|s| format!("{:.2}", s.p99_ms))),
            ("min_ms", |s| s.stats.as_ref().map(|s| format!("{:.2}", s.min_ms))),
            ("max_ms", |s| s.stats.as_ref().map(|s| format!("{:.2}", s.max_ms))),
        ];
        for (name, cell) in rows {
            let _ = writeln!(
                out,
                "{},{},{}",
                name,
                cell(&self.search).unwrap_or_else(|| "-".to_string()),
                cell(&self.insert).unwrap_or_else(|| "-".to_string()),
            );
        }
        out
    }

    /// Pretty-printed JSON, as written to disk.
    pub fn to_json_pretty(&self) -> BenchResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON summary to `path`, creating parent directories.
    pub async fn write_to(&self, path: &Path) -> BenchResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut json = self.to_json_pretty()?;
        json.push('\n');
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Drives one run against a live service.
pub struct BenchmarkRun {
    config: Arc<BenchConfig>,
    caller: Arc<dyn HttpCaller>,
}

impl BenchmarkRun {
    pub fn new(config: BenchConfig, caller: Arc<dyn HttpCaller>) -> Self {
        Self {
            config: Arc::new(config),
            caller,
        }
    }

    /// Recreate the collection, prefill it, then hold `concurrency` workers in
    /// a closed loop for `duration` and summarize what they recorded.
    ///
    /// Setup failures abort the run. Per-call failures during the timed window
    /// only show up in the error counts.
    pub async fn run(&self, pb: &ProgressBar) -> BenchResult<RunSummary> {
        let config = &self.config;
        config
            .validate()
            .map_err(|e| BenchError::InvalidConfig(e.to_string()))?;

        recreate_collection(self.caller.as_ref(), config).await?;
        Prefiller::new(config).run(self.caller.as_ref(), pb).await?;

        info!(
            "Starting {} workers ({} mode) for {}s against {}",
            config.concurrency, config.mode, config.duration_secs, config.base_url
        );

        let metrics = Arc::new(MetricsCollector::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let start = Instant::now();
        let handles: Vec<_> = (0..config.concurrency)
            .map(|index| {
                let worker = Worker::new(
                    index,
                    Arc::clone(config),
                    Arc::clone(&self.caller),
                    Arc::clone(&metrics),
                );
                tokio::spawn(worker.run(stop_rx.clone()))
            })
            .collect();
        drop(stop_rx);

        let deadline = start + config.duration();
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(DEADLINE_POLL.min(deadline - now)).await;
        }

        debug!("Deadline reached, stopping workers");
        // Workers hold receivers until they are joined, so send cannot fail here.
        let _ = stop_tx.send(true);

        let mut total = WorkerStats::default();
        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            let stats = joined.map_err(|e| BenchError::Worker {
                index,
                message: e.to_string(),
            })?;
            total.calls += stats.calls;
            total.successes += stats.successes;
            total.failures += stats.failures;
        }
        let wall = start.elapsed();

        let summary = RunSummary {
            duration_s: wall.as_secs_f64(),
            mode: config.mode,
            collection: config.collection.clone(),
            dimensions: config.dimensions,
            distance_metric: config.distance_metric.clone(),
            quantization: config.quantization,
            prefill: config.prefill,
            concurrency: config.concurrency,
            search_k: config.search_k,
            include_metadata: config.include_metadata,
            filter_type: config.active_filter(),
            search: metrics.summarize(OperationKind::Search, wall),
            insert: metrics.summarize(OperationKind::Insert, wall),
            errors: metrics.error_counts(),
        };

        info!(
            "Run finished in {:.2}s: {} calls, {} failed",
            summary.duration_s, total.calls, total.failures
        );
        Ok(summary)
    }
}
