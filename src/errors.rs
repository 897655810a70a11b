//! Error types for the retrieval engine.
//!
//! Per-entry and per-shard data problems are absorbed where they occur and
//! never surface here; these variants cover the failures a caller can act on.

use thiserror::Error;

/// Main error type for the retrieval engine
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Store construction / configuration errors (fatal at startup)
    #[error("Store configuration error: {0}")]
    Config(String),

    /// Query vector does not match the store's dimensionality
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding gateway returned an unusable response
    #[error("Embedding gateway error: {0}")]
    Gateway(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A whole query failed (distinct from "zero relevant matches")
    #[error("Search failed: {0}")]
    Search(String),
}

/// Result type alias for retrieval operations
pub type Result<T> = std::result::Result<T, RetrievalError>;

impl From<anyhow::Error> for RetrievalError {
    fn from(err: anyhow::Error) -> Self {
        RetrievalError::Search(err.to_string())
    }
}
