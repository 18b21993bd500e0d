//! One-shot sparse checkout of a few directories or files from a remote
//! repository, used to vendor single headers and scripts.

use clap::Parser;
use gantry_tools::{init_tracing, run_checked};
use std::{fs, path::PathBuf, process::exit};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "sparse-clone", version, about = "Check out parts of a repository")]
struct Cli {
    /// repository to clone from
    repo_url: String,
    /// directory to create the checkout in
    local_dir: PathBuf,
    /// directories or files to check out
    #[arg(required = true)]
    paths: Vec<String>,
    /// branch to fetch from
    #[arg(short, long, default_value = "master")]
    branch: String,
}

/// The git invocations a sparse checkout consists of, in order.
fn clone_steps<'a>(repo_url: &'a str, branch: &'a str, paths: &'a [String]) -> Vec<Vec<&'a str>> {
    let mut set = vec!["sparse-checkout", "set"];
    set.extend(paths.iter().map(String::as_str));

    vec![
        vec!["clone", repo_url, "--no-checkout", "--depth", "1", "."],
        vec!["sparse-checkout", "init"],
        set,
        vec!["checkout", branch],
    ]
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = fs::create_dir_all(&cli.local_dir) {
        error!(dir = ?cli.local_dir, "Failed to create checkout directory: {e}");
        exit(1);
    }

    for step in clone_steps(&cli.repo_url, &cli.branch, &cli.paths) {
        if let Err(e) = run_checked("git", &step, Some(&cli.local_dir)) {
            error!("{e}");
            exit(1);
        }
    }

    info!(dir = ?cli.local_dir, "Sparse checkout ready");
}
