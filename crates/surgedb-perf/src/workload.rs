//! Operation selection and request payloads.

use crate::config::{BenchConfig, FilterType, Mode};
use crate::dataset::VectorGenerator;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Operation kinds measured by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Search,
    Insert,
}

impl OperationKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Insert => "insert",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Choose the next operation from a uniform draw in [0, 1).
///
/// In mixed mode a draw past `search_ratio + insert_ratio` falls back to
/// search, not insert.
#[must_use]
pub fn select_operation(
    mode: Mode,
    search_ratio: f64,
    insert_ratio: f64,
    draw: f64,
) -> OperationKind {
    match mode {
        Mode::Search => OperationKind::Search,
        Mode::Insert => OperationKind::Insert,
        Mode::Mixed => {
            if draw < search_ratio {
                OperationKind::Search
            } else if draw < search_ratio + insert_ratio {
                OperationKind::Insert
            } else {
                OperationKind::Search
            }
        }
    }
}

/// Next operation for a worker. Only mixed mode consumes a draw from the stream.
pub fn next_operation(config: &BenchConfig, gen: &mut VectorGenerator) -> OperationKind {
    let draw = match config.mode {
        Mode::Mixed => gen.unit(),
        Mode::Search | Mode::Insert => 0.0,
    };
    select_operation(config.mode, config.search_ratio, config.insert_ratio, draw)
}

/// Filter body for a search request.
#[must_use]
pub fn filter_payload(filter_type: FilterType) -> Value {
    match filter_type {
        FilterType::Exact => json!({ "Exact": ["tag", "even"] }),
        FilterType::OneOf => json!({ "OneOf": ["tag", ["even", "odd"]] }),
        FilterType::Range => json!({ "Range": { "field": "score", "gt": 500.0 } }),
    }
}

/// Body for `POST /collections/{name}/search`.
pub fn search_payload(config: &BenchConfig, gen: &mut VectorGenerator) -> Value {
    let mut payload = json!({
        "vector": gen.vector(),
        "k": config.search_k,
    });
    if !config.include_metadata {
        payload["include_metadata"] = Value::Bool(false);
    }
    if let Some(filter_type) = config.active_filter() {
        payload["filter"] = filter_payload(filter_type);
    }
    payload
}

/// Body for `POST /collections/{name}/vectors`.
pub fn insert_payload(worker_index: usize, gen: &mut VectorGenerator) -> Value {
    let id = format!("insert_{}_{}", worker_index, gen.insert_suffix());
    let vector = gen.vector();
    json!({
        "id": id,
        "vector": vector,
        "metadata": gen.random_metadata(),
    })
}
