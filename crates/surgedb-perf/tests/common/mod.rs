//! In-process stand-in for the SurgeDB HTTP API.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Counters and switches shared with the handlers.
#[derive(Default)]
pub struct MockState {
    pub collections: Mutex<HashSet<String>>,
    pub create_bodies: Mutex<Vec<Value>>,
    pub batch_sizes: Mutex<Vec<usize>>,
    pub searches: AtomicU64,
    pub inserts: AtomicU64,
    pub health_probes: AtomicU64,
    pub fail_searches: AtomicBool,
    pub reject_create: AtomicBool,
}

impl MockState {
    pub fn searches(&self) -> u64 {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::SeqCst)
    }
}

pub struct MockSurgeDb {
    pub base_url: String,
    pub state: Arc<MockState>,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for MockSurgeDb {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serve the mock on an ephemeral localhost port.
pub async fn start_mock() -> MockSurgeDb {
    start_mock_with(MockState::default()).await
}

pub async fn start_mock_with(state: MockState) -> MockSurgeDb {
    let state = Arc::new(state);
    let app = Router::new()
        .route("/health", get(health))
        .route("/collections", post(create_collection))
        .route("/collections/:name", delete(delete_collection))
        .route("/collections/:name/vectors", post(insert_vector))
        .route("/collections/:name/vectors/batch", post(insert_batch))
        .route("/collections/:name/search", post(search))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockSurgeDb {
        base_url: format!("http://{addr}"),
        state,
        handle,
    }
}

/// A localhost URL nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn health(State(state): State<Arc<MockState>>) -> &'static str {
    state.health_probes.fetch_add(1, Ordering::SeqCst);
    "ok"
}

async fn create_collection(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if state.reject_create.load(Ordering::SeqCst) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unsupported quantization" })),
        );
    }
    let name = body["name"].as_str().unwrap_or_default().to_string();
    state.create_bodies.lock().push(body);
    state.collections.lock().insert(name.clone());
    (StatusCode::OK, Json(json!({ "name": name })))
}

async fn delete_collection(
    State(state): State<Arc<MockState>>,
    Path(name): Path<String>,
) -> StatusCode {
    if state.collections.lock().remove(&name) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn insert_vector(
    State(state): State<Arc<MockState>>,
    Path(_name): Path<String>,
    Json(_body): Json<Value>,
) -> Json<Value> {
    state.inserts.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "status": "ok" }))
}

async fn insert_batch(
    State(state): State<Arc<MockState>>,
    Path(_name): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let size = body["vectors"].as_array().map_or(0, Vec::len);
    state.batch_sizes.lock().push(size);
    Json(json!({ "inserted": size }))
}

async fn search(
    State(state): State<Arc<MockState>>,
    Path(_name): Path<String>,
    Json(_body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.searches.fetch_add(1, Ordering::SeqCst);
    if state.fail_searches.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "index unavailable" })),
        );
    }
    (StatusCode::OK, Json(json!({ "results": [] })))
}
