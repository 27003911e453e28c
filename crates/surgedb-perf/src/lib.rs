//! HTTP load-testing harness and scenario orchestrator for SurgeDB.

pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod health;
pub mod metrics;
pub mod orchestrator;
pub mod prefill;
pub mod report;
pub mod runner;
pub mod supervisor;
pub mod worker;
pub mod workload;

pub use client::{HttpCaller, HttpMethod, HttpRequest, HttpResponse, ReqwestCaller};
pub use config::{BenchConfig, ConfigError, FilterType, Mode, PerfConfig, Quantization, ScenarioDef};
pub use dataset::VectorGenerator;
pub use error::{BenchError, BenchResult, TransportError};
pub use health::HealthGate;
pub use metrics::{ErrorCounts, MetricsCollector, OperationSummary, SummaryStats};
pub use orchestrator::{
    InProcessExecutor, OrchestratorOptions, RunOutcome, ScenarioExecutor, ScenarioOrchestrator,
    SubprocessExecutor,
};
pub use prefill::{PrefillStats, Prefiller};
pub use report::{CoreBenchResult, FailureMarker, Report, ScenarioResult};
pub use runner::{BenchmarkRun, RunSummary};
pub use supervisor::{ServiceGuard, ServiceSupervisor, SupervisorError};
pub use workload::OperationKind;
