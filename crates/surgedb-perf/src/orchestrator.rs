//! End-to-end orchestration: start the service, gate on health, run every
//! scenario in order, run the secondary commands, write one report.
//!
//! Scenarios are independent of each other. A failed scenario is recorded and
//! the next one still runs; only a service that never comes up stops the
//! sequence early.

use crate::client::HttpCaller;
use crate::config::{BenchConfig, PerfConfig};
use crate::error::BenchResult;
use crate::health::{HealthGate, DEFAULT_POLL_INTERVAL, DEFAULT_PROBE_TIMEOUT};
use crate::report::{
    tail_lines, CoreBenchResult, FailureMarker, Report, ScenarioResult, CORE_TAIL_LINES,
    SCENARIO_TAIL_LINES,
};
use crate::runner::BenchmarkRun;
use crate::supervisor::{shell_command, ServiceSupervisor};
use async_trait::async_trait;
use indicatif::ProgressBar;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Directory, next to the report, that holds per-scenario summaries.
pub const SCENARIO_OUTPUT_DIR: &str = "_scenario_outputs";

/// Runs one resolved scenario and reports how it went.
///
/// Implementations never fail: every problem ends up in the returned
/// [`ScenarioResult`] as a non-zero return code and an error tail.
#[async_trait]
pub trait ScenarioExecutor: Send + Sync {
    async fn execute(&self, name: &str, config: &BenchConfig) -> ScenarioResult;
}

/// Runs scenarios inside the current process.
pub struct InProcessExecutor {
    caller: Arc<dyn HttpCaller>,
}

impl InProcessExecutor {
    pub fn new(caller: Arc<dyn HttpCaller>) -> Self {
        Self { caller }
    }
}

#[async_trait]
impl ScenarioExecutor for InProcessExecutor {
    async fn execute(&self, name: &str, config: &BenchConfig) -> ScenarioResult {
        let cmd = format!("surgedb-perf bench {}", config.to_cli_args().join(" "));
        let run = BenchmarkRun::new(config.clone(), Arc::clone(&self.caller));

        let outcome = match run.run(&ProgressBar::hidden()).await {
            Ok(summary) => {
                let persisted = match &config.output {
                    Some(path) => summary.write_to(path).await,
                    None => Ok(()),
                };
                persisted.and_then(|()| {
                    let json = summary.to_json_pretty()?;
                    let metrics = serde_json::to_value(&summary)?;
                    Ok((json, summary.render_table(), metrics))
                })
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok((json, table, metrics)) => ScenarioResult {
                name: name.to_string(),
                cmd,
                returncode: 0,
                stdout_tail: tail_lines(
                    &format!("{json}\n\nSummary\n{table}"),
                    SCENARIO_TAIL_LINES,
                ),
                stderr_tail: String::new(),
                metrics: Some(metrics),
            },
            Err(e) => ScenarioResult {
                name: name.to_string(),
                cmd,
                returncode: 1,
                stdout_tail: String::new(),
                stderr_tail: tail_lines(&e.to_string(), SCENARIO_TAIL_LINES),
                metrics: None,
            },
        }
    }
}

/// Runs each scenario as `<program> <leading args> <bench flags>` and reads
/// back the JSON summary it writes.
pub struct SubprocessExecutor {
    program: PathBuf,
    leading_args: Vec<String>,
}

impl SubprocessExecutor {
    pub fn new(program: impl Into<PathBuf>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    /// `<current executable> bench ...`
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, vec!["bench".to_string()]))
    }

    fn render(&self, args: &[String]) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl ScenarioExecutor for SubprocessExecutor {
    async fn execute(&self, name: &str, config: &BenchConfig) -> ScenarioResult {
        let mut args = self.leading_args.clone();
        args.extend(config.to_cli_args());
        let cmd = self.render(&args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                return ScenarioResult {
                    name: name.to_string(),
                    cmd,
                    returncode: -1,
                    stdout_tail: String::new(),
                    stderr_tail: format!("failed to spawn: {e}"),
                    metrics: None,
                };
            }
        };

        // Killed by a signal: no exit code.
        let returncode = output.status.code().unwrap_or(-1);
        let metrics = match (&config.output, returncode) {
            (Some(path), 0) => read_metrics(path).await,
            _ => None,
        };

        ScenarioResult {
            name: name.to_string(),
            cmd,
            returncode,
            stdout_tail: tail_lines(&String::from_utf8_lossy(&output.stdout), SCENARIO_TAIL_LINES),
            stderr_tail: tail_lines(&String::from_utf8_lossy(&output.stderr), SCENARIO_TAIL_LINES),
            metrics,
        }
    }
}

async fn read_metrics(path: &Path) -> Option<Value> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) => {
            warn!("No summary at {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Unreadable summary at {}: {}", path.display(), e);
            None
        }
    }
}

/// Run one secondary command through the shell and keep the tails.
pub async fn run_core_command(cmd: &str) -> CoreBenchResult {
    let output = shell_command(cmd).stdin(Stdio::null()).output().await;
    match output {
        Ok(output) => CoreBenchResult {
            cmd: cmd.to_string(),
            returncode: output.status.code().unwrap_or(-1),
            stdout_tail: tail_lines(&String::from_utf8_lossy(&output.stdout), CORE_TAIL_LINES),
            stderr_tail: tail_lines(&String::from_utf8_lossy(&output.stderr), CORE_TAIL_LINES),
        },
        Err(e) => CoreBenchResult {
            cmd: cmd.to_string(),
            returncode: -1,
            stdout_tail: String::new(),
            stderr_tail: format!("failed to spawn: {e}"),
        },
    }
}

/// Knobs of one orchestration.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Report path; scenario summaries go to a sibling directory
    pub output: PathBuf,
    /// Skip the `[core]` commands even when enabled
    pub skip_core: bool,
    /// Pause between failed health probes
    pub health_poll_interval: Duration,
    /// Discard the service's output
    pub quiet_service: bool,
}

impl OrchestratorOptions {
    #[must_use]
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            skip_core: false,
            health_poll_interval: DEFAULT_POLL_INTERVAL,
            quiet_service: false,
        }
    }

    /// Directory holding `<scenario>.json` summaries.
    #[must_use]
    pub fn scenario_output_dir(&self) -> PathBuf {
        self.output
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(SCENARIO_OUTPUT_DIR)
    }
}

/// What an orchestration produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: Report,
    /// `false` when the service failed to start or never became ready
    pub success: bool,
}

/// Drives a whole perf session against a freshly started service.
pub struct ScenarioOrchestrator {
    config: PerfConfig,
    options: OrchestratorOptions,
    executor: Arc<dyn ScenarioExecutor>,
    caller: Arc<dyn HttpCaller>,
}

impl ScenarioOrchestrator {
    /// `caller` is used for health probes only; scenarios talk to the service
    /// through `executor`.
    pub fn new(
        config: PerfConfig,
        options: OrchestratorOptions,
        executor: Arc<dyn ScenarioExecutor>,
        caller: Arc<dyn HttpCaller>,
    ) -> Self {
        Self {
            config,
            options,
            executor,
            caller,
        }
    }

    /// Run the session and write the report.
    ///
    /// Only a failure to write the report is an `Err`; everything else is
    /// reflected in the report and in [`RunOutcome::success`].
    pub async fn run(&self) -> BenchResult<RunOutcome> {
        let server = &self.config.server;
        let mut report = Report::new(self.config.clone());

        let supervisor = ServiceSupervisor::new(&server.start_cmd).quiet(self.options.quiet_service);
        let mut guard = match supervisor.start() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("{}", e);
                report.error = Some(FailureMarker::ServerStartFailed);
                return self.finish(report, false).await;
            }
        };

        let startup_timeout = Duration::from_secs(server.startup_timeout_secs);
        let gate = HealthGate::new(&server.base_url, &server.health_path, startup_timeout)
            .with_poll_interval(self.options.health_poll_interval)
            .with_probe_timeout(DEFAULT_PROBE_TIMEOUT.min(startup_timeout));

        if !gate.wait_ready(self.caller.as_ref()).await {
            match guard.try_exited() {
                Ok(Some(status)) => warn!("Service exited before becoming healthy: {}", status),
                _ => warn!("Server failed to become healthy in time"),
            }
            if let Err(e) = guard.shutdown().await {
                warn!("Service shutdown failed: {}", e);
            }
            report.error = Some(FailureMarker::ServerNotReady);
            return self.finish(report, false).await;
        }

        let output_dir = self.options.scenario_output_dir();
        if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
            // Scenarios still run; only their summaries go missing.
            warn!("Cannot create {}: {}", output_dir.display(), e);
        }

        let scenarios = &self.config.http.scenarios;
        for (i, scenario) in scenarios.iter().enumerate() {
            let mut bench = self.config.http.bench_config(&server.base_url, scenario);
            bench.output = Some(output_dir.join(format!("{}.json", scenario.name)));

            info!(
                "Scenario {}/{} '{}' ({} mode)",
                i + 1,
                scenarios.len(),
                scenario.name,
                bench.mode
            );
            let result = self.executor.execute(&scenario.name, &bench).await;
            if result.succeeded() {
                info!("Scenario '{}' finished", scenario.name);
            } else {
                warn!(
                    "Scenario '{}' failed with code {}",
                    scenario.name, result.returncode
                );
            }
            report.http.push(result);
        }

        if self.config.core.enabled && !self.options.skip_core {
            for cmd in &self.config.core.bench_cmds {
                info!("Secondary benchmark: {}", cmd);
                let result = run_core_command(cmd).await;
                if result.returncode != 0 {
                    warn!("`{}` exited with {}", cmd, result.returncode);
                }
                report.core.push(result);
            }
        }

        if let Err(e) = guard.shutdown().await {
            warn!("Service shutdown failed: {}", e);
        }

        self.finish(report, true).await
    }

    async fn finish(&self, report: Report, success: bool) -> BenchResult<RunOutcome> {
        report.write_to(&self.options.output).await?;
        Ok(RunOutcome { report, success })
    }
}
