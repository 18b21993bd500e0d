use clap::{Parser, Subcommand};
use gantry_bench::{
    config::{CiContext, PresentMode},
    pipeline::{self, BenchPlan, PipelineError, PublishPlan},
};
use std::{error::Error, path::PathBuf, process::exit, time::Duration};
use tracing::error;
use tracing_subscriber::EnvFilter;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "gantry-bench", version, about = "Benchmark the engine and publish chart history")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Benchmark the engine under every rendering backend
    Run(RunArgs),
    /// Merge both backends' results into the published chart history
    Publish(PublishArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// path to the engine binary to benchmark
    #[arg(long)]
    bin: PathBuf,
    /// file to store the DirectX 11 results in
    #[arg(long)]
    dx11: PathBuf,
    /// file to store the Vulkan results in
    #[arg(long)]
    vk: PathBuf,
    /// engine configuration document to point at each backend
    #[arg(long, default_value = "engine_config.json")]
    engine_config: PathBuf,
    /// presentation mode used while benchmarking
    #[arg(long, value_enum, default_value_t = PresentMode::Immediate)]
    present_mode: PresentMode,
    /// upper bound for a single benchmark run
    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,
}

#[derive(clap::Args, Debug)]
struct PublishArgs {
    /// DirectX 11 results produced by `run`
    #[arg(long)]
    dx11: PathBuf,
    /// Vulkan results produced by `run`
    #[arg(long)]
    vk: PathBuf,
    /// pages repository holding the chart data, as owner/name
    #[arg(long)]
    pages_repo: String,
    /// local checkout directory for the pages repository
    #[arg(long, default_value = "docs")]
    checkout_dir: PathBuf,
    /// upper bound for a single git operation
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,
}

fn run(args: RunArgs) -> Result<(), PipelineError> {
    let workdir = std::env::current_dir().map_err(gantry_bench::results::ResultError::from)?;

    pipeline::run_benchmarks(&BenchPlan {
        bin: args.bin,
        engine_config: args.engine_config,
        workdir,
        dx11_out: args.dx11,
        vk_out: args.vk,
        present_mode: Some(args.present_mode),
        timeout: Duration::from_secs(args.timeout_secs),
    })
}

fn publish(args: PublishArgs) -> Result<(), PipelineError> {
    let ci = CiContext::from_env()?;
    let (pages_owner, pages_name) = pipeline::parse_repository(&args.pages_repo)?;

    pipeline::publish_charts(&PublishPlan {
        dx11_results: args.dx11,
        vk_results: args.vk,
        pages_owner,
        pages_name,
        checkout_dir: args.checkout_dir,
        ci,
        http_timeout: HTTP_TIMEOUT,
        git_timeout: Duration::from_secs(args.timeout_secs),
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Run(args) => run(args),
        Commands::Publish(args) => publish(args),
    };

    if let Err(error) = outcome {
        error!("{error}");
        let mut source = error.source();
        while let Some(cause) = source {
            error!("caused by: {cause}");
            source = cause.source();
        }

        exit(1);
    }
}
