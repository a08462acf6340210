//! Error types for the Ferry CLI
//!
//! Messages are shown to the user as is, so they say what to check.

use ferry_server::db::DbError;
use ferry_server::error::{BlobError, ImportError, ParseError, StorageError};
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check APP_DB_DSN, CONFIG_PATH and the tenant map.")]
    Config(String),

    #[error("Database error: {0}. Check that the job database is reachable.")]
    Database(#[from] DbError),

    #[error("Job store error: {0}")]
    Storage(#[from] StorageError),

    #[error("Job {0} not found")]
    JobNotFound(i64),

    #[error("Cannot open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: BlobError,
    },

    /// The file failed to parse or validate
    #[error("{0}")]
    Import(#[from] ImportError),

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ParseError> for CliError {
    fn from(err: ParseError) -> Self {
        Self::Import(err.into())
    }
}

impl CliError {
    pub fn config(err: impl std::fmt::Display) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(CliError::JobNotFound(7).to_string(), "Job 7 not found");

        let err = CliError::from(ImportError::UnknownTenant("globex".to_string()));
        assert_eq!(err.to_string(), "unknown tenant 'globex'");
    }
}
