use std::{
    io::Read,
    path::Path,
    process::{Command, Stdio},
};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to spawn {0}")]
    Spawn(String, #[source] std::io::Error),
    #[error("{program} failed:\n{stderr}")]
    Failed { program: String, stderr: String },
}

/// Run a one-shot helper process to completion, failing on a non-zero exit
/// with the captured stderr.
pub fn run_checked(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<(), ToolError> {
    debug!(%program, ?args, "Running");

    let mut command = Command::new(program);
    command
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let mut child = command
        .spawn()
        .map_err(|e| ToolError::Spawn(program.to_owned(), e))?;
    let status = child
        .wait()
        .map_err(|e| ToolError::Spawn(program.to_owned(), e))?;

    if !status.success() {
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        return Err(ToolError::Failed {
            program: program.to_owned(),
            stderr,
        });
    }

    Ok(())
}

/// Default subscriber for the one-shot binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
