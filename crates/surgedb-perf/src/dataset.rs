//! Deterministic synthetic vectors and metadata.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

/// Seeded source of fixed-dimension vectors with components uniform in [0, 1).
///
/// Each worker owns its own generator (seeded `base_seed + worker_index`), so no
/// generator state is ever shared. The same stream also supplies the worker's
/// operation draws and insert ids, which keeps a seeded run reproducible.
#[derive(Debug, Clone)]
pub struct VectorGenerator {
    rng: StdRng,
    dimensions: usize,
}

impl VectorGenerator {
    #[must_use]
    pub fn new(seed: u64, dimensions: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            dimensions,
        }
    }

    /// Generator for one worker of a run.
    #[must_use]
    pub fn for_worker(base_seed: u64, worker_index: usize, dimensions: usize) -> Self {
        Self::new(base_seed.wrapping_add(worker_index as u64), dimensions)
    }

    pub fn vector(&mut self) -> Vec<f32> {
        let dimensions = self.dimensions;
        (0..dimensions).map(|_| self.rng.gen::<f32>()).collect()
    }

    /// Uniform draw in [0, 1).
    pub fn unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Id suffix for worker inserts, in `0..=1_000_000`.
    pub fn insert_suffix(&mut self) -> u32 {
        self.rng.gen_range(0..=1_000_000)
    }

    /// Metadata for a worker insert: random tag, score in [0, 1000).
    pub fn random_metadata(&mut self) -> Value {
        let tag = if self.rng.gen_range(0..=1) == 0 {
            "even"
        } else {
            "odd"
        };
        json!({
            "tag": tag,
            "score": self.unit() * 1000.0,
        })
    }
}

impl Iterator for VectorGenerator {
    type Item = Vec<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.vector())
    }
}

/// Metadata for the vector at `index` of a prefill.
///
/// The tag alternates by parity and the score is the index itself, which is what
/// the `Exact`/`OneOf`/`Range` search filters select on.
#[must_use]
pub fn indexed_metadata(index: usize) -> Value {
    json!({
        "tag": if index % 2 == 0 { "even" } else { "odd" },
        "score": index as f64,
    })
}
