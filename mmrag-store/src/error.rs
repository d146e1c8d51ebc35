use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Failed to load index from {path}: {reason}")]
    IndexLoad { path: String, reason: String },

    #[error("Failed to write index to {path}: {reason}")]
    IndexWrite { path: String, reason: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("Collection not found: {0}")]
    UnknownCollection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl StoreError {
    pub fn index_load(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::IndexLoad {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn index_write(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::IndexWrite {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
