//! `surgedb-perf run` driving real `surgedb-perf bench` subprocesses.
#![cfg(unix)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::process::Command;

const BIN: &str = env!("CARGO_BIN_EXE_surgedb-perf");

#[derive(Default)]
struct Counters {
    searches: AtomicU64,
    batches: AtomicU64,
}

/// Minimal SurgeDB API on an ephemeral port.
async fn serve_mock() -> (String, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/collections",
            post(|| async { Json(json!({ "status": "created" })) }),
        )
        .route("/collections/:name", delete(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/collections/:name/vectors",
            post(|| async { Json(json!({ "status": "ok" })) }),
        )
        .route("/collections/:name/vectors/batch", post(insert_batch))
        .route("/collections/:name/search", post(search))
        .with_state(Arc::clone(&counters));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), counters)
}

async fn insert_batch(State(c): State<Arc<Counters>>, Path(_): Path<String>) -> Json<Value> {
    c.batches.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "status": "ok" }))
}

async fn search(State(c): State<Arc<Counters>>, Path(_): Path<String>) -> Json<Value> {
    c.searches.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "results": [] }))
}

fn write_config(dir: &std::path::Path, base_url: &str, startup_timeout_secs: u64) -> PathBuf {
    let path = dir.join("perf.toml");
    let toml = format!(
        r#"
[server]
start_cmd = "sleep 30"
base_url = "{base_url}"
startup_timeout_secs = {startup_timeout_secs}

[http]
collection = "cli_run"
dimensions = 8
prefill = 20
batch_size = 10
duration = 1
concurrency = 2
quantization = "SQ8"

[[http.scenarios]]
name = "search_plain"
mode = "search"

[[http.scenarios]]
name = "mixed_range"
mode = "mixed"
use_filter = true
filter_type = "Range"

[core]
bench_cmds = ["echo core-ok"]
"#
    );
    std::fs::write(&path, toml).unwrap();
    path
}

async fn run_cli(config: &std::path::Path, output: &std::path::Path) -> std::process::Output {
    Command::new(BIN)
        .arg("run")
        .arg("--config")
        .arg(config)
        .arg("--output")
        .arg(output)
        .env("RUST_LOG", "info")
        .output()
        .await
        .unwrap()
}

fn read_report(path: &std::path::Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_spawns_bench_per_scenario() {
    let (base_url, counters) = serve_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &base_url, 5);
    let output = dir.path().join("perf").join("perf_report.json");

    let out = run_cli(&config, &output).await;

    let stdout = String::from_utf8_lossy(&out.stdout);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(out.status.success(), "{stderr}");
    // Printed once, not logged as well.
    assert_eq!(stdout.matches("Wrote report to").count(), 1);
    assert!(!stderr.contains("Wrote report to"));

    let report = read_report(&output);
    assert!(report.get("error").is_none());
    let http = report["http"].as_array().unwrap();
    assert_eq!(http.len(), 2);
    for (result, name) in http.iter().zip(["search_plain", "mixed_range"]) {
        assert_eq!(result["name"], name);
        assert_eq!(result["returncode"], 0, "{}", result["stderr_tail"]);
        let cmd = result["cmd"].as_str().unwrap();
        assert!(cmd.starts_with(BIN));
        assert!(cmd.contains(" bench --base-url "));
        assert!(result["stdout_tail"].as_str().unwrap().contains("Summary"));
        assert!(result["metrics"]["search"]["count"].as_u64().unwrap() > 0);
        assert_eq!(result["metrics"]["quantization"], "SQ8");
    }
    assert_eq!(http[1]["metrics"]["filter_type"], "Range");

    let outputs = dir.path().join("perf").join("_scenario_outputs");
    assert!(outputs.join("search_plain.json").exists());
    assert!(outputs.join("mixed_range.json").exists());

    assert_eq!(report["core"][0]["stdout_tail"], "core-ok");
    // 20 vectors in batches of 10, once per scenario
    assert_eq!(counters.batches.load(Ordering::SeqCst), 4);
    assert!(counters.searches.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn test_run_exits_1_when_service_never_ready() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &base_url, 1);
    let output = dir.path().join("perf_report.json");

    let out = run_cli(&config, &output).await;

    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Run aborted: server_not_ready"));
    let report = read_report(&output);
    assert_eq!(report["error"], "server_not_ready");
    assert_eq!(report["http"], json!([]));
}

#[tokio::test]
async fn test_run_exits_2_on_bad_config() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("perf_report.json");

    let out = run_cli(&dir.path().join("missing.toml"), &output).await;

    assert_eq!(out.status.code(), Some(2));
    assert!(!output.exists());
}
