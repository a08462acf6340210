//! Error types shared across ferry crates

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shared ferry operations
pub type Result<T> = std::result::Result<T, FerryError>;

#[derive(Error, Debug)]
pub enum FerryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in '{path}': {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FerryError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
