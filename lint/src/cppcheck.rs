use std::{
    fs::File,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LintError {
    #[error("failed to run cppcheck")]
    Spawn(#[from] std::io::Error),
    #[error("cppcheck exited with {0}")]
    Failed(i32),
}

/// One cppcheck invocation writing its diagnostics stream to a report file.
#[derive(Clone, Debug)]
pub struct LintJob {
    pub cppcheck: PathBuf,
    pub project: PathBuf,
    pub report: PathBuf,
    pub ignore: Option<PathBuf>,
}

impl LintJob {
    /// Argument list for this job; the report template must stay in sync
    /// with the shape `scan_report` parses.
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec![
            "--enable=all".to_owned(),
            "--template={callstack}: ({severity}) {message}".to_owned(),
            "--inconclusive".to_owned(),
            "-q".to_owned(),
            format!("--project={}", self.project.display()),
        ];

        if let Some(ignore) = &self.ignore {
            args.push(format!("-i{}", ignore.display()));
        }

        let threads = num_cpus::get().min(8);
        args.push(format!("-j{threads}"));

        args
    }

    /// Run the lint and capture its stderr stream as the report.
    pub fn generate(&self) -> Result<(), LintError> {
        let report = File::create(&self.report)?;
        let args = self.arguments();
        debug!(cppcheck = ?self.cppcheck, ?args, "Linting");

        let status = Command::new(&self.cppcheck)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::from(report))
            .status()?;

        if !status.success() {
            return Err(LintError::Failed(status.code().unwrap_or(-1)));
        }

        info!(report = ?self.report, "Lint report written");
        Ok(())
    }
}

/// cppcheck must exist before a report path is created.
pub fn locate_cppcheck(requested: &Path) -> Result<PathBuf, LintError> {
    if requested.components().count() > 1 {
        // explicit path, must exist as given
        if requested.is_file() {
            return Ok(requested.to_owned());
        }
        return Err(LintError::Spawn(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", requested.display()),
        )));
    }

    // bare name, resolved through PATH at spawn time
    Ok(requested.to_owned())
}
