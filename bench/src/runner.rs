use std::{
    io::Read,
    path::Path,
    process::{Command, Stdio},
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{debug, info};
use wait_timeout::ChildExt;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("benchmark process could not be driven")]
    Process(#[from] std::io::Error),
    #[error("benchmark run exceeded the {0:?} timeout")]
    Timeout(Duration),
    #[error("benchmark exited with {status}\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    NonZeroExit {
        status: i32,
        stdout: String,
        stderr: String,
    },
}

/// Run `<bin> --benchmark` to completion and validate its exit status.
///
/// The child runs inside `workdir`, where it reads the engine config and
/// writes its metrics to the well-known result file before exiting. A
/// non-zero exit or an expired timeout aborts the pipeline since no
/// trustworthy result can exist afterwards.
pub fn run_benchmark(bin: &Path, workdir: &Path, timeout: Duration) -> Result<(), RunError> {
    info!(bin = ?bin, "Benchmarking");
    let start = Instant::now();

    let mut child = Command::new(bin)
        .arg("--benchmark")
        .current_dir(workdir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            child.kill()?;
            // reap the killed child so no zombie outlives the stage
            child.wait()?;
            return Err(RunError::Timeout(timeout));
        }
    };

    let mut stdout = String::new();
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stdout.take() {
        pipe.read_to_string(&mut stdout)?;
    }
    if let Some(mut pipe) = child.stderr.take() {
        pipe.read_to_string(&mut stderr)?;
    }

    debug!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        success = status.success(),
        "Benchmark finished"
    );

    if !status.success() {
        return Err(RunError::NonZeroExit {
            status: status.code().unwrap_or(-1),
            stdout,
            stderr,
        });
    }

    Ok(())
}
