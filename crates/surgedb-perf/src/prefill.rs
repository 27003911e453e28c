//! Collection setup and prefill, both run before the timed window.

use crate::client::{join_url, HttpCaller};
use crate::config::{BenchConfig, Quantization};
use crate::dataset::{indexed_metadata, VectorGenerator};
use crate::error::{BenchError, BenchResult};
use indicatif::ProgressBar;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Outcome of a prefill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefillStats {
    pub batches: usize,
    pub vectors: usize,
}

/// Drop and recreate the target collection.
///
/// A failed delete is ignored (the collection usually does not exist yet); a
/// rejected create aborts the run.
pub async fn recreate_collection(
    caller: &dyn HttpCaller,
    config: &BenchConfig,
) -> BenchResult<()> {
    let collection_url = join_url(
        &config.base_url,
        &format!("/collections/{}", config.collection),
    );
    let deleted = caller
        .delete(&collection_url, config.request_timeout())
        .await?;
    debug!(
        "DELETE {} -> {} (ignored if not found)",
        collection_url, deleted.status
    );

    let mut payload = json!({
        "name": config.collection,
        "dimensions": config.dimensions,
        "distance_metric": config.distance_metric,
    });
    if config.quantization != Quantization::None {
        payload["quantization"] = Value::String(config.quantization.to_string());
    }

    let response = caller
        .post_json(
            &join_url(&config.base_url, "/collections"),
            payload,
            config.request_timeout(),
        )
        .await?;
    if response.is_error() {
        return Err(BenchError::create_collection(response.status, &response.body));
    }

    info!(
        "Created collection '{}' ({}d, {}, quantization {})",
        config.collection, config.dimensions, config.distance_metric, config.quantization
    );
    Ok(())
}

/// Loads synthetic vectors in batches before measurement starts.
pub struct Prefiller<'a> {
    config: &'a BenchConfig,
}

impl<'a> Prefiller<'a> {
    #[must_use]
    pub fn new(config: &'a BenchConfig) -> Self {
        Self { config }
    }

    /// Number of batch calls a prefill of `total` vectors needs.
    #[must_use]
    pub fn batch_count(total: usize, batch_size: usize) -> usize {
        total.div_ceil(batch_size.max(1))
    }

    /// Send every batch in order, stopping at the first rejected one.
    pub async fn run(
        &self,
        caller: &dyn HttpCaller,
        pb: &ProgressBar,
    ) -> BenchResult<PrefillStats> {
        let total = self.config.prefill;
        if total == 0 {
            pb.finish_and_clear();
            return Ok(PrefillStats::default());
        }

        let batch_size = self.config.batch_size.max(1);
        let batches = Self::batch_count(total, batch_size);
        let url = join_url(
            &self.config.base_url,
            &format!("/collections/{}/vectors/batch", self.config.collection),
        );
        let mut gen = VectorGenerator::new(self.config.seed, self.config.dimensions);

        info!(
            "Prefilling '{}' with {} vectors in {} batches",
            self.config.collection, total, batches
        );
        pb.set_length(total as u64);

        let mut sent = 0;
        for batch_idx in 0..batches {
            let end = (sent + batch_size).min(total);
            let vectors: Vec<Value> = (sent..end)
                .map(|idx| {
                    json!({
                        "id": format!("prefill_{idx}"),
                        "vector": gen.vector(),
                        "metadata": indexed_metadata(idx),
                    })
                })
                .collect();

            let response = caller
                .post_json(
                    &url,
                    json!({ "vectors": vectors }),
                    self.config.request_timeout(),
                )
                .await?;
            if response.is_error() {
                pb.abandon_with_message(format!("prefill failed at batch {}", batch_idx + 1));
                return Err(BenchError::prefill(response.status, &response.body));
            }

            debug!("Prefill batch {}/{} ({} vectors)", batch_idx + 1, batches, end - sent);
            pb.inc((end - sent) as u64);
            sent = end;
        }

        pb.finish_with_message(format!("prefilled {sent} vectors"));
        Ok(PrefillStats {
            batches,
            vectors: sent,
        })
    }
}
