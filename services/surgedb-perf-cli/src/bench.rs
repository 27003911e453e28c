use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use surgedb_perf::{
    BenchConfig, BenchmarkRun, FilterType, Mode, Quantization, ReqwestCaller, RunSummary,
};
use tracing::{error, info};

/// Flags of `surgedb-perf bench`.
#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Service base URL
    #[arg(long, default_value = "http://localhost:3000")]
    pub base_url: String,

    /// Collection to (re)create and load
    #[arg(long, default_value = "perf_collection")]
    pub collection: String,

    #[arg(long, default_value_t = 384)]
    pub dimensions: usize,

    /// Distance metric name passed through to the service
    #[arg(long, default_value = "Cosine")]
    pub distance: String,

    #[arg(long, value_enum, default_value = "None")]
    pub quantization: Quantization,

    /// Vectors loaded before the timed window
    #[arg(long, default_value_t = 10_000)]
    pub prefill: usize,

    #[arg(long, default_value_t = 200)]
    pub batch_size: usize,

    /// Operations issued during the timed window
    #[arg(long, value_enum, default_value = "mixed")]
    pub mode: Mode,

    /// Timed window in seconds
    #[arg(long, default_value_t = 60)]
    pub duration: u64,

    /// Concurrent closed-loop workers
    #[arg(long, default_value_t = 32)]
    pub concurrency: usize,

    #[arg(long, default_value_t = 10)]
    pub search_k: usize,

    /// Share of search calls in mixed mode
    #[arg(long, default_value_t = 0.7)]
    pub search_ratio: f64,

    /// Share of insert calls in mixed mode
    #[arg(long, default_value_t = 0.2)]
    pub insert_ratio: f64,

    /// Attach a metadata filter to searches
    #[arg(long)]
    pub use_filter: bool,

    /// Filter shape used with --use-filter
    #[arg(long, value_enum, default_value = "Exact")]
    pub filter_type: FilterType,

    /// Ask searches not to return metadata
    #[arg(long)]
    pub no_metadata: bool,

    /// Write the JSON summary here
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Per-call HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,
}

impl BenchArgs {
    pub fn into_config(self) -> BenchConfig {
        BenchConfig {
            base_url: self.base_url,
            collection: self.collection,
            dimensions: self.dimensions,
            distance_metric: self.distance,
            quantization: self.quantization,
            prefill: self.prefill,
            batch_size: self.batch_size,
            mode: self.mode,
            duration_secs: self.duration,
            concurrency: self.concurrency,
            search_k: self.search_k,
            search_ratio: self.search_ratio,
            insert_ratio: self.insert_ratio,
            use_filter: self.use_filter,
            filter_type: self.filter_type,
            include_metadata: !self.no_metadata,
            seed: self.seed,
            request_timeout_secs: self.request_timeout_secs,
            output: self.output,
        }
    }
}

pub async fn execute(args: BenchArgs) -> ExitCode {
    let config = args.into_config();
    let output = config.output.clone();

    let pb = ProgressBar::new(config.prefill as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let run = BenchmarkRun::new(config, Arc::new(ReqwestCaller::new()));
    let summary = match run.run(&pb).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Benchmark failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = print_summary(&summary) {
        error!("Failed to render summary: {}", e);
        return ExitCode::FAILURE;
    }

    if let Some(path) = output {
        if let Err(e) = summary.write_to(&path).await {
            error!("Failed to write {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        info!("Summary written to {}", path.display());
    }

    ExitCode::SUCCESS
}

fn print_summary(summary: &RunSummary) -> surgedb_perf::BenchResult<()> {
    println!("{}", summary.to_json_pretty()?);
    println!("\nSummary");
    print!("{}", summary.render_table());
    Ok(())
}
