//! Configuration for benchmark runs and the scenario orchestrator.
//!
//! Two layers live here:
//! 1. [`BenchConfig`] - one fully resolved load-test run (what `surgedb-perf bench` takes)
//! 2. [`PerfConfig`] - the orchestrator TOML file (`server`, `http`, `core` sections)
//!
//! The orchestrator file is loaded from disk, then environment variables override
//! individual fields, then the result is validated before any process is started.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Workload mode of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Search requests only
    Search,
    /// Single-vector inserts only
    Insert,
    /// Ratio-driven mix of search and insert
    #[default]
    Mixed,
}

impl Mode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Insert => "insert",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search" => Ok(Self::Search),
            "insert" => Ok(Self::Insert),
            "mixed" => Ok(Self::Mixed),
            other => Err(ConfigError::ValidationError(format!(
                "unknown mode '{other}' (allowed: search, insert, mixed)"
            ))),
        }
    }
}

/// Quantization requested when the collection is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Quantization {
    #[default]
    #[cfg_attr(feature = "clap", value(name = "None"))]
    None,
    #[cfg_attr(feature = "clap", value(name = "SQ8"))]
    SQ8,
    #[cfg_attr(feature = "clap", value(name = "Binary"))]
    Binary,
}

impl Quantization {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::SQ8 => "SQ8",
            Self::Binary => "Binary",
        }
    }
}

impl fmt::Display for Quantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quantization {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "SQ8" => Ok(Self::SQ8),
            "Binary" => Ok(Self::Binary),
            other => Err(ConfigError::ValidationError(format!(
                "unknown quantization '{other}' (allowed: None, SQ8, Binary)"
            ))),
        }
    }
}

/// Metadata filter shape attached to search requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum FilterType {
    #[default]
    #[cfg_attr(feature = "clap", value(name = "Exact"))]
    Exact,
    #[cfg_attr(feature = "clap", value(name = "OneOf"))]
    OneOf,
    #[cfg_attr(feature = "clap", value(name = "Range"))]
    Range,
}

impl FilterType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "Exact",
            Self::OneOf => "OneOf",
            Self::Range => "Range",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Exact" => Ok(Self::Exact),
            "OneOf" => Ok(Self::OneOf),
            "Range" => Ok(Self::Range),
            other => Err(ConfigError::ValidationError(format!(
                "unknown filter type '{other}' (allowed: Exact, OneOf, Range)"
            ))),
        }
    }
}

/// One fully resolved benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    pub base_url: String,
    pub collection: String,
    pub dimensions: usize,
    pub distance_metric: String,
    pub quantization: Quantization,
    /// Vectors loaded before the timed window (0 disables prefill)
    pub prefill: usize,
    pub batch_size: usize,
    pub mode: Mode,
    pub duration_secs: u64,
    pub concurrency: usize,
    pub search_k: usize,
    pub search_ratio: f64,
    pub insert_ratio: f64,
    pub use_filter: bool,
    pub filter_type: FilterType,
    pub include_metadata: bool,
    pub seed: u64,
    /// Per-call HTTP timeout
    pub request_timeout_secs: u64,
    /// Where the JSON summary is written, if anywhere
    pub output: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            collection: "perf_collection".to_string(),
            dimensions: 384,
            distance_metric: default_distance(),
            quantization: Quantization::None,
            prefill: 10_000,
            batch_size: default_batch_size(),
            mode: Mode::Mixed,
            duration_secs: 60,
            concurrency: 32,
            search_k: default_search_k(),
            search_ratio: default_search_ratio(),
            insert_ratio: default_insert_ratio(),
            use_filter: false,
            filter_type: FilterType::Exact,
            include_metadata: true,
            seed: default_seed(),
            request_timeout_secs: default_request_timeout(),
            output: None,
        }
    }
}

impl BenchConfig {
    /// Timed window of the run.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Filter type echoed into the summary (`None` when filters are off).
    #[must_use]
    pub fn active_filter(&self) -> Option<FilterType> {
        self.use_filter.then_some(self.filter_type)
    }

    /// Validate the run configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "base_url cannot be empty".to_string(),
            ));
        }
        if self.collection.is_empty() {
            return Err(ConfigError::ValidationError(
                "collection cannot be empty".to_string(),
            ));
        }
        if self.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "dimensions must be > 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "batch_size must be > 0".to_string(),
            ));
        }
        if self.duration_secs == 0 {
            return Err(ConfigError::ValidationError(
                "duration must be > 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "concurrency must be > 0".to_string(),
            ));
        }
        if self.search_k == 0 {
            return Err(ConfigError::ValidationError(
                "search_k must be > 0".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }
        for (name, ratio) in [
            ("search_ratio", self.search_ratio),
            ("insert_ratio", self.insert_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be within [0, 1], got {ratio}"
                )));
            }
        }
        if self.search_ratio + self.insert_ratio > 1.0 + f64::EPSILON {
            return Err(ConfigError::ValidationError(format!(
                "search_ratio + insert_ratio must be <= 1, got {}",
                self.search_ratio + self.insert_ratio
            )));
        }
        Ok(())
    }

    /// Render the run as `surgedb-perf bench` arguments.
    ///
    /// Used both to spawn scenario subprocesses and to record the equivalent
    /// command line for in-process runs.
    #[must_use]
    pub fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "--base-url".to_string(),
            self.base_url.clone(),
            "--collection".to_string(),
            self.collection.clone(),
            "--dimensions".to_string(),
            self.dimensions.to_string(),
            "--distance".to_string(),
            self.distance_metric.clone(),
            "--quantization".to_string(),
            self.quantization.to_string(),
            "--prefill".to_string(),
            self.prefill.to_string(),
            "--batch-size".to_string(),
            self.batch_size.to_string(),
            "--duration".to_string(),
            self.duration_secs.to_string(),
            "--concurrency".to_string(),
            self.concurrency.to_string(),
            "--mode".to_string(),
            self.mode.to_string(),
            "--search-k".to_string(),
            self.search_k.to_string(),
            "--search-ratio".to_string(),
            self.search_ratio.to_string(),
            "--insert-ratio".to_string(),
            self.insert_ratio.to_string(),
            "--seed".to_string(),
            self.seed.to_string(),
            "--request-timeout-secs".to_string(),
            self.request_timeout_secs.to_string(),
        ];

        if self.use_filter {
            args.push("--use-filter".to_string());
            args.push("--filter-type".to_string());
            args.push(self.filter_type.to_string());
        }
        if !self.include_metadata {
            args.push("--no-metadata".to_string());
        }
        if let Some(output) = &self.output {
            args.push("--output".to_string());
            args.push(output.display().to_string());
        }
        args
    }
}

/// Orchestrator configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerfConfig {
    /// Service-under-test lifecycle
    pub server: ServerConfig,

    /// HTTP benchmark settings shared by all scenarios
    pub http: HttpConfig,

    /// Opaque secondary benchmark commands
    #[serde(default)]
    pub core: CoreConfig,
}

/// How to start and probe the service under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Shell command that starts the service
    pub start_cmd: String,

    /// Readiness probe path (default: "/health")
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Seconds to wait for the probe to succeed (default: 60)
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,

    /// Base URL of the service (default: "http://localhost:3000")
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// HTTP benchmark section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub collection: String,
    pub dimensions: usize,
    pub prefill: usize,
    /// Timed window per scenario, in seconds
    pub duration: u64,
    pub concurrency: usize,

    #[serde(default = "default_distance")]
    pub distance: String,

    #[serde(default)]
    pub quantization: Quantization,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_search_k")]
    pub search_k: usize,

    #[serde(default = "default_search_ratio")]
    pub search_ratio: f64,

    #[serde(default = "default_insert_ratio")]
    pub insert_ratio: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Scenarios, executed in declaration order
    #[serde(default)]
    pub scenarios: Vec<ScenarioDef>,
}

/// One named, parameterized benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioDef {
    pub name: String,

    #[serde(default = "default_scenario_mode")]
    pub mode: Mode,

    #[serde(default)]
    pub use_filter: bool,

    #[serde(default)]
    pub filter_type: Option<FilterType>,

    #[serde(default)]
    pub no_metadata: bool,
}

/// Secondary (non-HTTP) benchmark commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub bench_cmds: Vec<String>,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_startup_timeout() -> u64 {
    60
}

fn default_distance() -> String {
    "Cosine".to_string()
}

fn default_batch_size() -> usize {
    200
}

fn default_search_k() -> usize {
    10
}

fn default_search_ratio() -> f64 {
    0.7
}

fn default_insert_ratio() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_request_timeout() -> u64 {
    30
}

fn default_scenario_mode() -> Mode {
    Mode::Search
}

fn default_true() -> bool {
    true
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bench_cmds: Vec::new(),
        }
    }
}

impl HttpConfig {
    /// Layer a scenario's overrides on top of the shared HTTP settings.
    #[must_use]
    pub fn bench_config(&self, base_url: &str, scenario: &ScenarioDef) -> BenchConfig {
        BenchConfig {
            base_url: base_url.to_string(),
            collection: self.collection.clone(),
            dimensions: self.dimensions,
            distance_metric: self.distance.clone(),
            quantization: self.quantization,
            prefill: self.prefill,
            batch_size: self.batch_size,
            mode: scenario.mode,
            duration_secs: self.duration,
            concurrency: self.concurrency,
            search_k: self.search_k,
            search_ratio: self.search_ratio,
            insert_ratio: self.insert_ratio,
            use_filter: scenario.use_filter,
            filter_type: scenario.filter_type.unwrap_or_default(),
            include_metadata: !scenario.no_metadata,
            seed: self.seed,
            request_timeout_secs: default_request_timeout(),
            output: None,
        }
    }
}

impl PerfConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::TomlError { path, source: e })
    }

    /// Load, apply environment overrides, then validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path.as_ref())?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported environment variables:
    /// - `SURGEDB_PERF_BASE_URL` - Service base URL
    /// - `SURGEDB_PERF_START_CMD` - Service start command
    /// - `SURGEDB_PERF_DURATION` - Seconds per scenario
    /// - `SURGEDB_PERF_CONCURRENCY` - Workers per scenario
    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var("SURGEDB_PERF_BASE_URL") {
            self.server.base_url = base_url;
        }

        if let Ok(start_cmd) = std::env::var("SURGEDB_PERF_START_CMD") {
            self.server.start_cmd = start_cmd;
        }

        if let Ok(duration) = std::env::var("SURGEDB_PERF_DURATION") {
            if let Ok(duration) = duration.parse() {
                self.http.duration = duration;
            }
        }

        if let Ok(concurrency) = std::env::var("SURGEDB_PERF_CONCURRENCY") {
            if let Ok(concurrency) = concurrency.parse() {
                self.http.concurrency = concurrency;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Every scenario is resolved into a [`BenchConfig`] and validated, so a bad
    /// ratio or dimension fails here instead of after the service is up.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.start_cmd.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "server.start_cmd cannot be empty".to_string(),
            ));
        }

        if self.server.startup_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "server.startup_timeout_secs must be > 0".to_string(),
            ));
        }

        if !self.server.health_path.starts_with('/') {
            return Err(ConfigError::ValidationError(
                "server.health_path must start with '/'".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for scenario in &self.http.scenarios {
            if scenario.name.is_empty()
                || scenario.name.contains(['/', '\\'])
                || scenario.name.starts_with('.')
            {
                return Err(ConfigError::ValidationError(format!(
                    "invalid scenario name '{}'",
                    scenario.name
                )));
            }
            if !seen.insert(scenario.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate scenario name '{}'",
                    scenario.name
                )));
            }
            self.http
                .bench_config(&self.server.base_url, scenario)
                .validate()
                .map_err(|e| match e {
                    ConfigError::ValidationError(msg) => ConfigError::ValidationError(format!(
                        "scenario '{}': {msg}",
                        scenario.name
                    )),
                    other => other,
                })?;
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file
    #[error("Failed to read config file {path:?}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("Failed to parse TOML in {path:?}: {source}")]
    TomlError {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Validation error
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
