use crate::{config::Backend, github::RevisionMetadata, results::BenchmarkResult};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs::OpenOptions,
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};
use thiserror::Error;
use tracing::{info, warn};

/// Location of the chart store inside the pages repository checkout.
pub const CHART_DATA_PATH: &str = "_data/charts.json";

/// Commit message used for every chart data update.
pub const UPDATE_MESSAGE: &str = "Update charts data";

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("chart store could not be accessed")]
    Io(#[from] std::io::Error),
    #[error("chart store is corrupt")]
    Corrupt(#[from] serde_json::Error),
    #[error("chart store series for {metric} have diverging lengths")]
    Misaligned { metric: &'static str },
}

/// One tracked metric: per-backend sample arrays plus the shared label
/// array. Index `i` across all three describes the same revision, and index
/// order is append order.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct MetricSeries {
    pub vulkan: Vec<f64>,
    pub directx11: Vec<f64>,
    pub labels: Vec<String>,
}

impl MetricSeries {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.vulkan.is_empty() && self.directx11.is_empty()
    }

    fn samples_mut(&mut self, backend: Backend) -> &mut Vec<f64> {
        match backend {
            Backend::Vulkan => &mut self.vulkan,
            Backend::DirectX11 => &mut self.directx11,
        }
    }

    fn check_aligned(&self, metric: &'static str) -> Result<(), ChartError> {
        if self.vulkan.len() == self.labels.len() && self.directx11.len() == self.labels.len() {
            Ok(())
        } else {
            Err(ChartError::Misaligned { metric })
        }
    }

    fn append(&mut self, label: &str, samples: &[(Backend, f64)]) {
        for (backend, sample) in samples {
            self.samples_mut(*backend).push(*sample);
        }
        self.labels.push(label.to_owned());
    }
}

/// Metadata of one charted revision, keyed by its abbreviated label.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CommitNote {
    pub message: String,
    pub timestamp: String,
}

/// The accumulating historical log the dashboard charts from. Only ever
/// appended to.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChartStore {
    #[serde(rename = "AverageFPS")]
    pub average_fps: MetricSeries,
    #[serde(
        rename = "PeakMemoryUsage",
        default,
        skip_serializing_if = "MetricSeries::is_empty"
    )]
    pub peak_memory_usage: MetricSeries,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub commits: BTreeMap<String, CommitNote>,
    // settings the dashboard keeps next to the series must round-trip
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ChartStore {
    fn check_aligned(&self) -> Result<(), ChartError> {
        self.average_fps.check_aligned("AverageFPS")?;
        self.peak_memory_usage.check_aligned("PeakMemoryUsage")
    }

    /// Append one data point per metric per backend for `label`.
    ///
    /// Samples land in backend-run order. The peak memory series is only
    /// extended when both backends reported the metric, so its arrays stay
    /// index-aligned. Commit metadata is inserted idempotently: re-running
    /// the same revision overwrites its note instead of duplicating it.
    pub fn append_run(
        &mut self,
        label: &str,
        metadata: &RevisionMetadata,
        dx11: &BenchmarkResult,
        vulkan: &BenchmarkResult,
    ) {
        self.average_fps.append(
            label,
            &[
                (Backend::DirectX11, dx11.average_fps),
                (Backend::Vulkan, vulkan.average_fps),
            ],
        );

        match (dx11.peak_memory_usage, vulkan.peak_memory_usage) {
            (Some(dx11_peak), Some(vulkan_peak)) => {
                self.peak_memory_usage.append(
                    label,
                    &[
                        (Backend::DirectX11, dx11_peak),
                        (Backend::Vulkan, vulkan_peak),
                    ],
                );
            }
            (None, None) => {}
            _ => warn!(
                %label,
                "Peak memory was reported by only one backend, skipping the metric"
            ),
        }

        self.commits.insert(
            label.to_owned(),
            CommitNote {
                message: metadata.message.clone(),
                timestamp: metadata.timestamp.clone(),
            },
        );
    }
}

/// Read-modify-write the chart store under an exclusive lock.
///
/// The document is validated against the alignment invariant both after
/// loading and before the rewrite; nothing is written when either check or
/// the mutation fails.
pub fn update<F>(path: &Path, mutate: F) -> Result<(), ChartError>
where
    F: FnOnce(&mut ChartStore) -> Result<(), ChartError>,
{
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    file.lock_exclusive()?;

    let mut raw = String::new();
    file.read_to_string(&mut raw)?;

    let mut store: ChartStore = serde_json::from_str(&raw)?;
    store.check_aligned()?;

    mutate(&mut store)?;
    store.check_aligned()?;

    info!(path = ?path, points = store.average_fps.labels.len(), "Writing chart store");

    file.seek(SeekFrom::Start(0))?;
    let serialized = serde_json::to_string_pretty(&store)?;
    file.write_all(serialized.as_bytes())?;
    file.set_len(serialized.len() as u64)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn metadata() -> RevisionMetadata {
        RevisionMetadata {
            message: "Rework swapchain".to_owned(),
            timestamp: "2020-05-11T09:30:00Z".to_owned(),
        }
    }

    fn result(average_fps: f64, peak: Option<f64>) -> BenchmarkResult {
        BenchmarkResult {
            average_fps,
            peak_memory_usage: peak,
        }
    }

    fn seeded_store() -> ChartStore {
        serde_json::from_str(
            r#"{
                "AverageFPS": {
                    "vulkan": [10.0, 20.0],
                    "directx11": [8.0, 15.0],
                    "labels": ["abc1234", "def5678"]
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn append_extends_every_sequence_by_one() {
        let mut store = seeded_store();

        store.append_run("9998877", &metadata(), &result(18.0, None), &result(25.0, None));

        assert_eq!(store.average_fps.vulkan, vec![10.0, 20.0, 25.0]);
        assert_eq!(store.average_fps.directx11, vec![8.0, 15.0, 18.0]);
        assert_eq!(
            store.average_fps.labels,
            vec!["abc1234", "def5678", "9998877"]
        );
        assert_eq!(store.commits["9998877"], CommitNote {
            message: "Rework swapchain".to_owned(),
            timestamp: "2020-05-11T09:30:00Z".to_owned(),
        });
    }

    #[test]
    fn rerunning_a_revision_appends_samples_but_dedups_metadata() {
        let mut store = seeded_store();

        store.append_run("9998877", &metadata(), &result(18.0, None), &result(25.0, None));
        store.append_run("9998877", &metadata(), &result(19.0, None), &result(26.0, None));

        assert_eq!(store.average_fps.labels.len(), 4);
        assert_eq!(store.average_fps.vulkan.len(), 4);
        assert_eq!(store.commits.len(), 1);
    }

    #[test]
    fn peak_memory_needs_both_backends() {
        let mut store = seeded_store();

        store.append_run(
            "1112223",
            &metadata(),
            &result(18.0, Some(800.0)),
            &result(25.0, None),
        );
        assert!(store.peak_memory_usage.is_empty());

        store.append_run(
            "4445556",
            &metadata(),
            &result(18.0, Some(810.0)),
            &result(25.0, Some(700.0)),
        );
        assert_eq!(store.peak_memory_usage.directx11, vec![810.0]);
        assert_eq!(store.peak_memory_usage.vulkan, vec![700.0]);
        assert_eq!(store.peak_memory_usage.labels, vec!["4445556"]);
    }

    #[test]
    fn update_applies_the_documented_append_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charts.json");
        fs::write(
            &path,
            r#"{
                "AverageFPS": {
                    "vulkan": [10.0, 20.0],
                    "directx11": [8.0, 15.0],
                    "labels": ["abc1234", "def5678"]
                }
            }"#,
        )
        .unwrap();

        update(&path, |store| {
            store.append_run("9998877", &metadata(), &result(18.0, None), &result(25.0, None));
            Ok(())
        })
        .unwrap();

        let store: ChartStore = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(store.average_fps.vulkan, vec![10.0, 20.0, 25.0]);
        assert_eq!(store.average_fps.directx11, vec![8.0, 15.0, 18.0]);
        assert_eq!(
            store.average_fps.labels,
            vec!["abc1234", "def5678", "9998877"]
        );
    }

    #[test]
    fn misaligned_stores_are_rejected_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charts.json");
        let original = r#"{
            "AverageFPS": {
                "vulkan": [10.0],
                "directx11": [8.0, 15.0],
                "labels": ["abc1234", "def5678"]
            }
        }"#;
        fs::write(&path, original).unwrap();

        let outcome = update(&path, |_| panic!("mutation must not run"));
        assert!(matches!(
            outcome,
            Err(ChartError::Misaligned {
                metric: "AverageFPS"
            })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn unparsable_stores_are_corrupt_and_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charts.json");
        fs::write(&path, "{ truncated").unwrap();

        assert!(matches!(
            update(&path, |_| Ok(())),
            Err(ChartError::Corrupt(_))
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ truncated");
    }

    #[test]
    fn dashboard_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charts.json");
        fs::write(
            &path,
            r#"{
                "AverageFPS": {"vulkan": [], "directx11": [], "labels": []},
                "Theme": {"grid": true}
            }"#,
        )
        .unwrap();

        update(&path, |_| Ok(())).unwrap();

        let document: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["Theme"]["grid"], true);
    }
}
