//! Error taxonomy for the indexing and answer engine.
//!
//! Library code returns [`RagError`]; the CLI wraps it in `anyhow` at the
//! edge. Provider failures are the only errors considered transient, see
//! [`RagError::is_transient`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("unsupported document format: {media_type}")]
    UnsupportedFormat { media_type: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no index found for topic '{0}'")]
    IndexNotFound(String),

    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("provider call timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("session {0} not found")]
    SessionNotFound(i64),

    #[error("extraction failed for {file}: {reason}")]
    Extraction { file: String, reason: String },

    #[error("index error: {0}")]
    Index(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Whether a retry of the same provider call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RagError::ProviderError(_) | RagError::ProviderTimeout(_))
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::ProviderError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
