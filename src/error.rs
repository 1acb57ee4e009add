//! Error taxonomy for the ingestion pipeline, the article store and the vote ledger.
//!
//! Only a few of these ever reach a caller. Classification, summarization and
//! keyword extraction degrade to default values and log the failure instead of
//! returning one of these variants; the orchestrator catches per-headline
//! errors and moves on. [`Error::DomainMismatch`] is the one failure that is
//! expected to surface when a user hands us a URL directly.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The URL's origin is neither the source's base origin nor an approved child origin.
    #[error("URL domain does not match the source's website domain: {url}")]
    DomainMismatch { url: String },

    /// The page or API payload could not be turned into the expected record.
    #[error("failed to parse {url}: {reason}")]
    Parse { url: String, reason: String },

    /// Transport failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from a remote endpoint.
    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The chat completion service failed or returned an unusable payload.
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion { db_version: u32, latest_supported: u32 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn parse(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// True when the error is a rejected origin rather than a transient fault.
    pub fn is_domain_mismatch(&self) -> bool {
        matches!(self, Self::DomainMismatch { .. })
    }
}
