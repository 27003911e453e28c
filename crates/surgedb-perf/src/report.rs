//! Aggregated orchestrator report.

use crate::config::PerfConfig;
use crate::error::BenchResult;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Lines kept from a scenario's output streams.
pub const SCENARIO_TAIL_LINES: usize = 10;

/// Lines kept from a secondary command's output streams.
pub const CORE_TAIL_LINES: usize = 20;

/// Why an orchestration ended before running scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMarker {
    /// The health probe never answered 200 within the startup timeout
    ServerNotReady,
    /// The start command could not be spawned
    ServerStartFailed,
}

impl FailureMarker {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ServerNotReady => "server_not_ready",
            Self::ServerStartFailed => "server_start_failed",
        }
    }
}

impl fmt::Display for FailureMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one HTTP scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    /// Command line that ran (or would run) the scenario
    pub cmd: String,
    pub returncode: i32,
    pub stdout_tail: String,
    pub stderr_tail: String,
    /// Parsed run summary, present only for a successful run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
}

impl ScenarioResult {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.returncode == 0
    }
}

/// Outcome of one secondary benchmark command. Output is not interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreBenchResult {
    pub cmd: String,
    pub returncode: i32,
    pub stdout_tail: String,
    pub stderr_tail: String,
}

/// Top-level report, written once per orchestration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// RFC 3339, UTC
    pub timestamp: String,
    /// Configuration as resolved after environment overrides
    pub config: PerfConfig,
    pub http: Vec<ScenarioResult>,
    pub core: Vec<CoreBenchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureMarker>,
}

impl Report {
    /// Empty report stamped with the current time.
    #[must_use]
    pub fn new(config: PerfConfig) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            config,
            http: Vec::new(),
            core: Vec::new(),
            error: None,
        }
    }

    /// Every scenario exited 0.
    #[must_use]
    pub fn all_scenarios_succeeded(&self) -> bool {
        self.http.iter().all(ScenarioResult::succeeded)
    }

    /// Write pretty-printed JSON to `path`, creating parent directories.
    pub async fn write_to(&self, path: &Path) -> BenchResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Last `n` lines of `text`, joined with `\n`.
#[must_use]
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
