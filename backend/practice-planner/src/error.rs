//! Typed failures for the planning pipeline.
//!
//! Only [`ConfigError::Missing`] is meant to stop the process. Everything else is
//! recovered close to where it happens: search errors are retried, generation and
//! extraction errors collapse into an empty question list, and aggregate conflicts
//! are retried against a fresh snapshot.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required credential or setting is absent; no retry can fix this.
    #[error("required configuration `{0}` is not set")]
    Missing(&'static str),

    #[error("configuration source error: {0}")]
    Source(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("search rate limited: {0}")]
    RateLimited(String),

    #[error("search transport error: {0}")]
    Transport(String),
}

impl SearchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SearchError::RateLimited(_))
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Transport(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation transport error: {0}")]
    Transport(String),

    #[error("generation endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generation endpoint returned no content")]
    EmptyResponse,
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Transport(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no JSON array of objects found in response")]
    NoJsonArray,

    #[error("no JSON object found in response")]
    NoJsonObject,

    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AggregateUpdateError {
    #[error("user aggregate for {0} was modified concurrently")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AggregateUpdateError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, AggregateUpdateError::Conflict(_))
    }
}
