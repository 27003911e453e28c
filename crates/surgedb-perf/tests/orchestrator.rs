//! Full orchestration with a stand-in service process.
#![cfg(unix)]

mod common;

use common::{closed_port_url, start_mock};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use surgedb_perf::{
    FailureMarker, HttpCaller, InProcessExecutor, OrchestratorOptions, PerfConfig, Report,
    ReqwestCaller, ScenarioOrchestrator,
};

fn perf_config(base_url: &str, startup_timeout_secs: u64, core_cmds: &[&str]) -> PerfConfig {
    let core = core_cmds
        .iter()
        .map(|c| format!("{c:?}"))
        .collect::<Vec<_>>()
        .join(", ");
    let toml = format!(
        r#"
[server]
start_cmd = "sleep 30"
base_url = "{base_url}"
startup_timeout_secs = {startup_timeout_secs}

[http]
collection = "orchestrated"
dimensions = 8
prefill = 20
batch_size = 10
duration = 1
concurrency = 2

[[http.scenarios]]
name = "search_plain"
mode = "search"

[[http.scenarios]]
name = "mixed_filtered"
mode = "mixed"
use_filter = true
filter_type = "OneOf"
no_metadata = true

[core]
bench_cmds = [{core}]
"#
    );
    let config: PerfConfig = toml::from_str(&toml).unwrap();
    config.validate().unwrap();
    config
}

fn orchestrator(config: PerfConfig, output: &Path, skip_core: bool) -> ScenarioOrchestrator {
    let caller: Arc<dyn HttpCaller> = Arc::new(ReqwestCaller::new());
    let mut options = OrchestratorOptions::new(output);
    options.skip_core = skip_core;
    options.health_poll_interval = Duration::from_millis(50);
    options.quiet_service = true;
    ScenarioOrchestrator::new(
        config,
        options,
        Arc::new(InProcessExecutor::new(Arc::clone(&caller))),
        caller,
    )
}

fn read_report(path: &Path) -> Report {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_not_ready_service_writes_marker() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("perf_report.json");
    let base_url = closed_port_url().await;

    let started = Instant::now();
    let outcome = orchestrator(perf_config(&base_url, 1, &["echo never"]), &output, false)
        .run()
        .await
        .unwrap();

    assert!(!outcome.success);
    // Startup budget plus the terminate grace window at most.
    assert!(started.elapsed() < Duration::from_secs(8));

    let report = read_report(&output);
    assert_eq!(report.error, Some(FailureMarker::ServerNotReady));
    assert!(report.http.is_empty());
    assert!(report.core.is_empty());
    assert_eq!(report.config.http.scenarios.len(), 2);
    assert!(!dir.path().join("_scenario_outputs").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scenarios_run_in_order() {
    let mock = start_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("perf").join("perf_report.json");

    let outcome = orchestrator(
        perf_config(&mock.base_url, 5, &["echo core-ok", "echo oops >&2; exit 4"]),
        &output,
        false,
    )
    .run()
    .await
    .unwrap();

    assert!(outcome.success);
    let report = read_report(&output);
    assert!(report.error.is_none());

    let names: Vec<&str> = report.http.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["search_plain", "mixed_filtered"]);
    for result in &report.http {
        assert_eq!(result.returncode, 0, "{}", result.stderr_tail);
        assert!(result.cmd.starts_with("surgedb-perf bench --base-url"));
        assert!(result.stdout_tail.starts_with("Summary\nmetric,search,insert\n"));
        assert!(result.stdout_tail.lines().last().unwrap().starts_with("max_ms,"));
        let metrics = result.metrics.as_ref().unwrap();
        assert!(metrics["search"]["count"].as_u64().unwrap() > 0);
    }
    let filtered = report.http[1].metrics.as_ref().unwrap();
    assert_eq!(filtered["filter_type"], "OneOf");
    assert_eq!(filtered["include_metadata"], false);
    assert!(report.http[1].cmd.contains("--use-filter --filter-type OneOf"));

    let outputs = dir.path().join("perf").join("_scenario_outputs");
    assert!(outputs.join("search_plain.json").exists());
    assert!(outputs.join("mixed_filtered.json").exists());

    assert_eq!(report.core.len(), 2);
    assert_eq!(report.core[0].returncode, 0);
    assert_eq!(report.core[0].stdout_tail, "core-ok");
    assert_eq!(report.core[1].returncode, 4);
    assert_eq!(report.core[1].stderr_tail, "oops");

    assert!(mock.state.health_probes.load(std::sync::atomic::Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_skip_core() {
    let mock = start_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("perf_report.json");
    let mut config = perf_config(&mock.base_url, 5, &["echo core-ok"]);
    config.http.scenarios.truncate(1);

    let outcome = orchestrator(config, &output, true).run().await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.report.http.len(), 1);
    assert!(outcome.report.core.is_empty());
    assert!(read_report(&output).core.is_empty());
}

#[tokio::test]
async fn test_disabled_core_section() {
    let mock = start_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("perf_report.json");
    let mut config = perf_config(&mock.base_url, 5, &["echo core-ok"]);
    config.http.scenarios.clear();
    config.core.enabled = false;

    let outcome = orchestrator(config, &output, false).run().await.unwrap();

    assert!(outcome.success);
    assert!(outcome.report.http.is_empty());
    assert!(outcome.report.core.is_empty());
}

#[tokio::test]
async fn test_failed_scenario_does_not_stop_the_rest() {
    let mock = start_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("perf_report.json");
    let config = perf_config(&mock.base_url, 5, &[]);
    mock.state
        .reject_create
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let outcome = orchestrator(config, &output, false).run().await.unwrap();

    assert!(outcome.success);
    let report = read_report(&output);
    assert_eq!(report.http.len(), 2);
    for result in &report.http {
        assert_eq!(result.returncode, 1);
        assert!(result.metrics.is_none());
        assert!(result.stderr_tail.contains("create collection failed: 400"));
    }
}

/// Alive and not a zombie.
#[cfg(target_os = "linux")]
fn is_running(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    stat.rsplit_once(')')
        .and_then(|(_, rest)| rest.trim_start().chars().next())
        .is_some_and(|state| state != 'Z' && state != 'X')
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abandoned_run_kills_service_tree() {
    let mock = start_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("perf_report.json");
    let pid_file = dir.path().join("server.pid");
    let mut config = perf_config(&mock.base_url, 5, &[]);
    // A wrapper that keeps the real server in a background child.
    config.server.start_cmd = format!(
        "sleep 30 & echo $! > '{}'; wait",
        pid_file.display()
    );

    // Two one-second scenarios; give up in the middle of the first.
    let abandoned = {
        let orch = orchestrator(config, &output, false);
        tokio::time::timeout(Duration::from_millis(700), orch.run()).await
    };
    assert!(abandoned.is_err());

    let server_pid: u32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while is_running(server_pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!is_running(server_pid), "server {server_pid} outlived the run");
    assert!(!output.exists());
}
