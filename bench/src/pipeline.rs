use crate::{
    charts::{self, ChartError, CHART_DATA_PATH, UPDATE_MESSAGE},
    config::{self, Backend, ConfigError, PresentMode, UsageError, BACKENDS},
    github::{self, LookupError},
    publish::{PublishError, Publisher},
    results::{BenchmarkResult, ResultError, ResultSlot},
    runner::{self, RunError},
};
use std::{path::PathBuf, time::Duration};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid invocation")]
    Usage(#[from] UsageError),
    #[error("engine config is unreadable")]
    ConfigUnreadable(#[from] ConfigError),
    #[error("benchmark execution failed")]
    BenchmarkExecutionFailed(#[from] RunError),
    #[error("benchmark result file error")]
    ResultFile(#[from] ResultError),
    #[error("revision lookup failed")]
    RevisionLookupFailed(#[from] LookupError),
    #[error("chart store update failed")]
    ChartStore(#[from] ChartError),
    #[error("publishing chart data failed")]
    PublishFailed(#[from] PublishError),
}

/// Inputs of the benchmark stage: select backend, run, relocate, once per
/// backend.
#[derive(Clone, Debug)]
pub struct BenchPlan {
    pub bin: PathBuf,
    pub engine_config: PathBuf,
    /// directory the engine writes its well-known result file into
    pub workdir: PathBuf,
    pub dx11_out: PathBuf,
    pub vk_out: PathBuf,
    pub present_mode: Option<PresentMode>,
    pub timeout: Duration,
}

impl BenchPlan {
    fn output_for(&self, backend: Backend) -> &PathBuf {
        match backend {
            Backend::DirectX11 => &self.dx11_out,
            Backend::Vulkan => &self.vk_out,
        }
    }
}

/// Benchmark every backend in run order and leave one result document per
/// backend behind.
///
/// The well-known result filename is claimed for the whole invocation and
/// wiped together with previous per-backend outputs up front, so a retry
/// after a mid-run failure starts from a clean slate.
pub fn run_benchmarks(plan: &BenchPlan) -> Result<(), PipelineError> {
    let slot = ResultSlot::acquire(&plan.workdir)?;
    slot.clean(&[&plan.dx11_out, &plan.vk_out])?;

    for backend in BACKENDS {
        config::select_backend(&plan.engine_config, backend, plan.present_mode)?;
        runner::run_benchmark(&plan.bin, &plan.workdir, plan.timeout)?;
        slot.collect(plan.output_for(backend))?;
        info!(%backend, "Benchmark recorded");
    }

    Ok(())
}

/// Inputs of the publish stage: fetch provenance, extend the series, push.
#[derive(Clone, Debug)]
pub struct PublishPlan {
    pub dx11_results: PathBuf,
    pub vk_results: PathBuf,
    pub pages_owner: String,
    pub pages_name: String,
    pub checkout_dir: PathBuf,
    pub ci: config::CiContext,
    pub http_timeout: Duration,
    pub git_timeout: Duration,
}

/// Merge both backends' results into the chart store and push the update.
///
/// The revision lookup runs before the chart store is opened for writing:
/// when the lookup fails, the store on disk stays byte-identical.
pub fn publish_charts(plan: &PublishPlan) -> Result<(), PipelineError> {
    let dx11 = BenchmarkResult::load(&plan.dx11_results)?;
    let vulkan = BenchmarkResult::load(&plan.vk_results)?;

    let metadata = github::fetch_revision_metadata(
        &plan.ci.repo_owner,
        &plan.ci.repo_name,
        &plan.ci.revision,
        plan.http_timeout,
    )?;

    let publisher = Publisher::new(
        &plan.pages_owner,
        &plan.pages_name,
        &plan.ci.token,
        &plan.checkout_dir,
        plan.git_timeout,
    );
    publisher.ensure_checkout()?;

    charts::update(&plan.checkout_dir.join(CHART_DATA_PATH), |store| {
        store.append_run(plan.ci.label(), &metadata, &dx11, &vulkan);
        Ok(())
    })?;

    publisher.publish(CHART_DATA_PATH, UPDATE_MESSAGE)?;

    Ok(())
}

/// Split an `owner/name` repository argument.
pub fn parse_repository(argument: &str) -> Result<(String, String), UsageError> {
    argument
        .split_once('/')
        .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
        .map(|(owner, name)| (owner.to_owned(), name.to_owned()))
        .ok_or_else(|| UsageError::BadRepository(argument.to_owned()))
}
