use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, warn};

/// Fixed filename the engine writes its benchmark metrics to.
pub const RESULT_FILE_NAME: &str = "benchmark_results.json";

#[derive(Error, Debug)]
pub enum ResultError {
    #[error("benchmark produced no result file at {0}")]
    Missing(PathBuf),
    #[error("result file could not be accessed")]
    Io(#[from] std::io::Error),
    #[error("result file is malformed")]
    Malformed(#[from] serde_json::Error),
}

/// Metrics document produced by a single benchmark run.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BenchmarkResult {
    #[serde(rename = "AverageFPS")]
    pub average_fps: f64,
    // only written by newer engine revisions
    #[serde(rename = "PeakMemoryUsage", skip_serializing_if = "Option::is_none")]
    pub peak_memory_usage: Option<f64>,
}

impl BenchmarkResult {
    pub fn load(path: &Path) -> Result<Self, ResultError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Exclusive claim on the well-known result filename for the duration of a
/// pipeline invocation.
///
/// The engine always writes to the same fixed path, so two overlapping
/// invocations would trample each other's output. The claim is backed by an
/// exclusive lock on a sibling lock file and released on drop.
#[derive(Debug)]
pub struct ResultSlot {
    path: PathBuf,
    _lock: File,
}

impl ResultSlot {
    /// Acquire the slot inside `dir`, blocking on the lock if another
    /// invocation still holds it.
    pub fn acquire(dir: &Path) -> Result<Self, ResultError> {
        let lock_path = dir.join(format!("{RESULT_FILE_NAME}.lock"));
        let lock = File::create(&lock_path)?;
        lock.lock_exclusive()?;
        debug!(lock = ?lock_path, "Claimed benchmark result slot");

        Ok(Self {
            path: dir.join(RESULT_FILE_NAME),
            _lock: lock,
        })
    }

    /// Remove the well-known file and any per-backend outputs left over from
    /// an earlier invocation, so a retried run starts from a clean slate.
    pub fn clean(&self, previous_outputs: &[&Path]) -> Result<(), ResultError> {
        for stale in std::iter::once(self.path.as_path()).chain(previous_outputs.iter().copied()) {
            match fs::remove_file(stale) {
                Ok(()) => warn!(path = ?stale, "Removed stale benchmark output"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    /// Move the freshly written result to its backend-qualified path.
    pub fn collect(&self, dest: &Path) -> Result<(), ResultError> {
        if !self.path.is_file() {
            return Err(ResultError::Missing(self.path.clone()));
        }

        fs::rename(&self.path, dest)?;
        debug!(dest = ?dest, "Relocated benchmark result");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_removes_stale_outputs_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let stale_result = dir.path().join(RESULT_FILE_NAME);
        let stale_vk = dir.path().join("vk_results.json");
        fs::write(&stale_result, "{}").unwrap();
        fs::write(&stale_vk, "{}").unwrap();
        let never_written = dir.path().join("dx11_results.json");

        let slot = ResultSlot::acquire(dir.path()).unwrap();
        slot.clean(&[&stale_vk, &never_written]).unwrap();

        assert!(!stale_result.exists());
        assert!(!stale_vk.exists());

        // second pass over an already clean directory is a no-op
        slot.clean(&[&stale_vk, &never_written]).unwrap();
    }

    #[test]
    fn collect_renames_the_well_known_file() {
        let dir = tempfile::tempdir().unwrap();
        let slot = ResultSlot::acquire(dir.path()).unwrap();
        fs::write(dir.path().join(RESULT_FILE_NAME), r#"{"AverageFPS":60.0}"#).unwrap();

        let dest = dir.path().join("dx11_results.json");
        slot.collect(&dest).unwrap();

        assert!(!dir.path().join(RESULT_FILE_NAME).exists());
        let result = BenchmarkResult::load(&dest).unwrap();
        assert_eq!(result.average_fps, 60.0);
        assert!(result.peak_memory_usage.is_none());
    }

    #[test]
    fn collect_without_output_reports_the_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let slot = ResultSlot::acquire(dir.path()).unwrap();

        match slot.collect(&dir.path().join("vk_results.json")) {
            Err(ResultError::Missing(path)) => {
                assert_eq!(path, dir.path().join(RESULT_FILE_NAME))
            }
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn result_documents_may_carry_peak_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        fs::write(&path, r#"{"AverageFPS":144.5,"PeakMemoryUsage":912.0}"#).unwrap();

        let result = BenchmarkResult::load(&path).unwrap();
        assert_eq!(result.average_fps, 144.5);
        assert_eq!(result.peak_memory_usage, Some(912.0));
    }

    #[test]
    fn malformed_result_documents_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        fs::write(&path, r#"{"AverageFPS":"fast"}"#).unwrap();

        assert!(matches!(
            BenchmarkResult::load(&path),
            Err(ResultError::Malformed(_))
        ));
    }
}
