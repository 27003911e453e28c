use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

mod bench;
mod run;

use bench::BenchArgs;
use run::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "surgedb-perf")]
#[command(about = "SurgeDB HTTP load tester and perf scenario runner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one load test against a running SurgeDB instance
    Bench(BenchArgs),

    /// Start SurgeDB, run every configured scenario, write a report
    Run(RunArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Bench(args) => bench::execute(args).await,
        Commands::Run(args) => run::execute(args).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the JSON summary and the table
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
