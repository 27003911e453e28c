//! Closed-loop load worker.

use crate::client::{join_url, HttpCaller};
use crate::config::BenchConfig;
use crate::dataset::VectorGenerator;
use crate::metrics::MetricsCollector;
use crate::workload::{insert_payload, next_operation, search_payload, OperationKind};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Calls issued by one worker, by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
}

/// One closed-loop client: issues a call, waits for the answer, repeats.
///
/// Each worker owns its generator, so its request stream depends only on the
/// base seed and its index.
pub struct Worker {
    index: usize,
    config: Arc<BenchConfig>,
    caller: Arc<dyn HttpCaller>,
    metrics: Arc<MetricsCollector>,
    gen: VectorGenerator,
    search_url: String,
    insert_url: String,
}

impl Worker {
    pub fn new(
        index: usize,
        config: Arc<BenchConfig>,
        caller: Arc<dyn HttpCaller>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let gen = VectorGenerator::for_worker(config.seed, index, config.dimensions);
        let search_url = join_url(
            &config.base_url,
            &format!("/collections/{}/search", config.collection),
        );
        let insert_url = join_url(
            &config.base_url,
            &format!("/collections/{}/vectors", config.collection),
        );
        Self {
            index,
            config,
            caller,
            metrics,
            gen,
            search_url,
            insert_url,
        }
    }

    /// Loop until `stop` flips to `true`.
    ///
    /// The flag is checked between calls, so an in-flight request always
    /// completes and is recorded.
    pub async fn run(mut self, stop: watch::Receiver<bool>) -> WorkerStats {
        let mut stats = WorkerStats::default();

        while !*stop.borrow() {
            let kind = next_operation(&self.config, &mut self.gen);
            let (url, payload) = match kind {
                OperationKind::Search => (
                    self.search_url.as_str(),
                    search_payload(&self.config, &mut self.gen),
                ),
                OperationKind::Insert => (
                    self.insert_url.as_str(),
                    insert_payload(self.index, &mut self.gen),
                ),
            };

            let start = Instant::now();
            let result = self
                .caller
                .post_json(url, payload, self.config.request_timeout())
                .await;
            let elapsed = start.elapsed().as_secs_f64();
            stats.calls += 1;

            match result {
                Ok(response) if response.is_error() => {
                    trace!("worker {} {} -> {}", self.index, kind, response.status);
                    self.metrics.record_error(kind);
                    stats.failures += 1;
                }
                Ok(_) => {
                    self.metrics.record_success(kind, elapsed);
                    stats.successes += 1;
                }
                Err(e) => {
                    // Transport failures are always counted against search.
                    trace!("worker {} {} transport error: {}", self.index, kind, e);
                    self.metrics.record_error(OperationKind::Search);
                    stats.failures += 1;
                }
            }
        }

        debug!(
            "worker {} stopped after {} calls ({} failed)",
            self.index, stats.calls, stats.failures
        );
        stats
    }
}
