use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("index not found at {}", .0.display())]
    IndexNotFound(PathBuf),

    #[error("index at {} is corrupt: {reason}", path.display())]
    IndexCorrupt { path: PathBuf, reason: String },

    #[error("embedding model mismatch: index uses '{index_model}', query uses '{query_model}'")]
    ModelMismatch { index_model: String, query_model: String },

    #[error("model '{model}' is unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },

    #[error("unsupported document format at {}: {reason}", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("empty query")]
    EmptyQuery,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::IndexCorrupt { path: path.into(), reason: reason.into() }
    }

    pub fn unavailable(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelUnavailable { model: model.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
