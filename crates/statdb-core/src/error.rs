//! Error types shared across the stats store.

use thiserror::Error;

/// Errors that can occur in stats tree operations.
///
/// "No data yet" is routine for readers, so `get`/`children` report absence
/// through `Option`/empty results rather than an error variant.
#[derive(Error, Debug, Clone)]
pub enum StatsError {
    #[error("schema must declare at least one level")]
    EmptySchema,

    #[error("path depth {len} outside schema levels 1..={depth}")]
    InvalidPathDepth { len: usize, depth: usize },

    #[error("transport failed: {0}")]
    Transport(String),

    #[error("batch apply failed: {0}")]
    Apply(String),

    #[error("storage failed: {0}")]
    Storage(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StatsError {
    fn from(err: serde_json::Error) -> Self {
        StatsError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StatsError>;
