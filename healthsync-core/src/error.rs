//! Error types for healthsync-core

use thiserror::Error;

/// Main error type for the healthsync-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error (artifact namespace, export files, logs)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Data source query failed
    #[error("query error for {category}: {message}")]
    Query { category: String, message: String },

    /// Invalid chunking request
    #[error("chunk error: {0}")]
    Chunk(String),
}

impl Error {
    /// Build a query error for a category
    pub fn query(category: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Query {
            category: category.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for healthsync-core
pub type Result<T> = std::result::Result<T, Error>;
