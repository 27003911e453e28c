use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use surgedb_perf::{
    HttpCaller, InProcessExecutor, OrchestratorOptions, PerfConfig, ReqwestCaller,
    ScenarioExecutor, ScenarioOrchestrator, SubprocessExecutor,
};
use tracing::{error, warn};

/// Flags of `surgedb-perf run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Orchestrator TOML file
    #[arg(long, default_value = "scripts/perf/perf.toml")]
    pub config: PathBuf,

    /// Report path
    #[arg(long, default_value = "scripts/perf/perf_report.json")]
    pub output: PathBuf,

    /// Do not run the [core] benchmark commands
    #[arg(long)]
    pub skip_core: bool,

    /// Run scenarios inside this process instead of spawning `surgedb-perf bench`
    #[arg(long)]
    pub in_process: bool,
}

pub async fn execute(args: RunArgs) -> ExitCode {
    let config = match PerfConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    let caller: Arc<dyn HttpCaller> = Arc::new(ReqwestCaller::new());
    let executor: Arc<dyn ScenarioExecutor> = if args.in_process {
        Arc::new(InProcessExecutor::new(Arc::clone(&caller)))
    } else {
        match SubprocessExecutor::current_exe() {
            Ok(executor) => Arc::new(executor),
            Err(e) => {
                warn!("Cannot locate own executable ({}), running in-process", e);
                Arc::new(InProcessExecutor::new(Arc::clone(&caller)))
            }
        }
    };

    let mut options = OrchestratorOptions::new(&args.output);
    options.skip_core = args.skip_core;

    let orchestrator = ScenarioOrchestrator::new(config, options, executor, caller);
    match orchestrator.run().await {
        Ok(outcome) => {
            if let Some(marker) = outcome.report.error {
                println!("Run aborted: {}", marker);
            }
            if !outcome.report.all_scenarios_succeeded() {
                warn!("One or more scenarios failed, see the report for details");
            }
            println!("Wrote report to {}", args.output.display());
            if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("Failed to write report: {}", e);
            ExitCode::FAILURE
        }
    }
}
