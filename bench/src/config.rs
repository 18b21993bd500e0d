use fs2::FileExt;
use serde_json::Value;
use std::{
    fs::OpenOptions,
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};
use thiserror::Error;
use tracing::debug;

/// Well-known key for the rendering backend in the engine config.
const API_KEY: &str = "API";
const PRESENT_MODE_KEY: &str = "PresentationMode";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("engine config could not be opened")]
    Unreadable(#[from] std::io::Error),
    #[error("engine config is malformed")]
    Malformed(#[from] serde_json::Error),
    #[error("engine config root is not an object")]
    NotAnObject,
}

#[derive(Error, Debug)]
pub enum UsageError {
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("repository must be of the form owner/name, got '{0}'")]
    BadRepository(String),
}

/// The rendering backends the engine can be benchmarked under.
/// Run order is DirectX11 first, then Vulkan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    DirectX11,
    Vulkan,
}

pub const BACKENDS: [Backend; 2] = [Backend::DirectX11, Backend::Vulkan];

impl Backend {
    /// value written into the engine config's API field
    pub fn config_value(&self) -> &'static str {
        match self {
            Self::DirectX11 => "DirectX11",
            Self::Vulkan => "Vulkan",
        }
    }

    /// key of this backend's sample array in the chart store
    pub fn chart_key(&self) -> &'static str {
        match self {
            Self::DirectX11 => "directx11",
            Self::Vulkan => "vulkan",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.config_value())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    Fifo,
}

impl PresentMode {
    pub fn config_value(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Mailbox => "mailbox",
            Self::Fifo => "fifo",
        }
    }
}

impl std::fmt::Display for PresentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.config_value())
    }
}

/// Point the engine at `backend` by rewriting its config document in place.
///
/// Only the API field (and the presentation mode, when one is supplied) is
/// touched; every other setting round-trips unchanged, in order. The file is
/// held under an exclusive lock for the whole read-modify-write.
pub fn select_backend(
    path: &Path,
    backend: Backend,
    present_mode: Option<PresentMode>,
) -> Result<(), ConfigError> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    file.lock_exclusive()?;

    let mut raw = String::new();
    file.read_to_string(&mut raw)?;

    let mut document: Value = serde_json::from_str(&raw)?;
    let settings = document.as_object_mut().ok_or(ConfigError::NotAnObject)?;

    settings.insert(
        API_KEY.to_owned(),
        Value::String(backend.config_value().to_owned()),
    );
    if let Some(mode) = present_mode {
        settings.insert(
            PRESENT_MODE_KEY.to_owned(),
            Value::String(mode.config_value().to_owned()),
        );
    }

    debug!(config = ?path, %backend, "Rewriting engine config");

    file.seek(SeekFrom::Start(0))?;
    let serialized = serde_json::to_string_pretty(&document)?;
    file.write_all(serialized.as_bytes())?;
    file.set_len(serialized.len() as u64)?;
    // lock is released when `file` drops

    Ok(())
}

/// CI-provided identity of the run, validated in one step before the
/// pipeline performs any side effect.
#[derive(Clone, Debug)]
pub struct CiContext {
    /// full revision id of the benchmarked commit
    pub revision: String,
    /// owner of the benchmarked repository
    pub repo_owner: String,
    /// name of the benchmarked repository
    pub repo_name: String,
    /// write credential for the pages repository
    pub token: String,
}

impl CiContext {
    pub fn from_env() -> Result<Self, UsageError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, UsageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let revision = lookup("GITHUB_SHA").ok_or(UsageError::MissingEnv("GITHUB_SHA"))?;
        let repository =
            lookup("GITHUB_REPOSITORY").ok_or(UsageError::MissingEnv("GITHUB_REPOSITORY"))?;
        let token = lookup("PAT").ok_or(UsageError::MissingEnv("PAT"))?;

        let (repo_owner, repo_name) = repository
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
            .ok_or_else(|| UsageError::BadRepository(repository.clone()))?;

        Ok(Self {
            revision,
            repo_owner: repo_owner.to_owned(),
            repo_name: repo_name.to_owned(),
            token,
        })
    }

    /// abbreviated revision used as the chart label
    pub fn label(&self) -> &str {
        let end = self.revision.len().min(7);
        &self.revision[..end]
    }
}
