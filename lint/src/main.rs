mod cppcheck;
mod report;

use clap::{Parser, Subcommand};
use cppcheck::{locate_cppcheck, LintJob};
use report::{files_of_interest, scan_report};
use std::{
    collections::HashSet,
    error::Error,
    fs::{self, File},
    io::BufReader,
    path::PathBuf,
    process::exit,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gantry-lint", version, about = "Generate and gate on static analysis reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run cppcheck over the project and store the raw report
    Generate(GenerateArgs),
    /// Turn a report into CI annotations and a pass/fail verdict
    Read(ReadArgs),
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// path in which to store the lint report
    #[arg(long)]
    report: PathBuf,
    /// project file to lint
    #[arg(long)]
    project: PathBuf,
    /// cppcheck executable, bare names resolve through PATH
    #[arg(long, default_value = "cppcheck")]
    cppcheck: PathBuf,
    /// file or directory to ignore when linting
    #[arg(long)]
    ignore: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ReadArgs {
    /// report produced by `generate`
    #[arg(long)]
    report: PathBuf,
    /// CSV list of file paths modified in the merge request
    #[arg(long)]
    modified_files: Option<PathBuf>,
    /// CSV list of file paths added in the merge request
    #[arg(long)]
    added_files: Option<PathBuf>,
}

fn generate(args: GenerateArgs) -> Result<(), Box<dyn Error>> {
    let cppcheck = locate_cppcheck(&args.cppcheck)?;
    let job = LintJob {
        cppcheck,
        project: args.project,
        report: args.report,
        ignore: args.ignore,
    };

    job.generate()?;
    Ok(())
}

fn load_lists(args: &ReadArgs) -> Result<HashSet<String>, Box<dyn Error>> {
    let mut lists = Vec::new();
    for path in [&args.modified_files, &args.added_files].into_iter().flatten() {
        lists.push(fs::read_to_string(path)?);
    }

    let refs: Vec<&str> = lists.iter().map(String::as_str).collect();
    Ok(files_of_interest(&refs))
}

fn read(args: ReadArgs) -> Result<bool, Box<dyn Error>> {
    let files = load_lists(&args)?;
    let reader = BufReader::new(File::open(&args.report)?);
    let outcome = scan_report(reader, &files)?;

    for annotation in &outcome.annotations {
        println!("{annotation}");
    }

    info!(
        warnings = outcome.annotations.len(),
        suppressed = outcome.suppressed.len(),
        "Report scanned"
    );
    if !outcome.suppressed.is_empty() {
        println!("Suppressed messages:");
        for message in &outcome.suppressed {
            println!("{message}");
        }
    }

    Ok(outcome.passed())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Generate(args) => generate(args).map(|()| true),
        Commands::Read(args) => read(args),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => exit(1),
        Err(error) => {
            error!("{error}");
            exit(1);
        }
    }
}
