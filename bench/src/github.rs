use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("commit lookup request failed")]
    Request(#[from] reqwest::Error),
    #[error("commit lookup for {url} returned {status}")]
    Status { url: String, status: u16 },
    #[error("commit metadata is missing '{0}'")]
    MissingField(&'static str),
}

/// Provenance of the revision a data point is recorded for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionMetadata {
    pub message: String,
    pub timestamp: String,
}

/// Fetch commit message and author timestamp for one revision.
///
/// A single attempt against the hosting API; anything but a 200 aborts the
/// pipeline, since a data point without provenance must never be recorded.
pub fn fetch_revision_metadata(
    owner: &str,
    repo: &str,
    revision: &str,
    timeout: Duration,
) -> Result<RevisionMetadata, LookupError> {
    let url = format!("https://api.github.com/repos/{owner}/{repo}/commits/{revision}");
    info!(%url, "Fetching commit metadata");

    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent("gantry-bench")
        .build()?;
    let response = client.get(url.as_str()).send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(LookupError::Status {
            url,
            status: status.as_u16(),
        });
    }

    let body: Value = response.json()?;
    let metadata = parse_commit(&body)?;
    debug!(timestamp = %metadata.timestamp, "Commit metadata resolved");

    Ok(metadata)
}

/// Extract the fields the chart store keeps from a commit document.
fn parse_commit(body: &Value) -> Result<RevisionMetadata, LookupError> {
    let message = body
        .pointer("/commit/message")
        .and_then(Value::as_str)
        .ok_or(LookupError::MissingField("commit.message"))?;
    let timestamp = body
        .pointer("/commit/author/date")
        .and_then(Value::as_str)
        .ok_or(LookupError::MissingField("commit.author.date"))?;

    Ok(RevisionMetadata {
        message: message.to_owned(),
        timestamp: timestamp.to_owned(),
    })
}
