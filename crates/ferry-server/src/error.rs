//! Error types for the import pipeline, job store and REST layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::jobs::JobStatus;

/// Result type alias for job store operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Job store or tenant store I/O failure
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Job {job_id} is {current}, cannot mark it {target}")]
    InvalidTransition {
        job_id: i64,
        current: JobStatus,
        target: JobStatus,
    },

    #[error("Job {0} not found")]
    NotFound(i64),

    #[error("Job {job_id} has unrecognized status '{status}'")]
    UnknownStatus { job_id: i64, status: String },
}

/// Caller input problem detected before or during import
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported product type '{0}'")]
    UnsupportedProduct(String),

    #[error("invalid table name '{0}': only lowercase letters, digits, '_' and '-' are allowed")]
    InvalidTableName(String),

    #[error("record {index} missing required field {field}")]
    MissingField { index: usize, field: String },
}

/// Malformed input file
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line {line}: expected key=value, got '{content}'")]
    MalformedLine { line: usize, content: String },

    #[error("no parser registered for content type {0}")]
    UnsupportedFormat(String),

    #[error("line {line}: invalid UTF-8")]
    InvalidUtf8 { line: usize },

    #[error("delimited input: {0}")]
    Delimited(#[source] csv_async::Error),

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv_async::Error> for ParseError {
    /// Read failures from the underlying stream stay I/O errors; everything
    /// else the csv reader reports is malformed input.
    fn from(err: csv_async::Error) -> Self {
        let io = match err.kind() {
            csv_async::ErrorKind::Io(io) => Some(std::io::Error::new(io.kind(), io.to_string())),
            _ => None,
        };
        match io {
            Some(io) => ParseError::Io(io),
            None => ParseError::Delimited(err),
        }
    }
}

/// Failure to open or read a blob
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("blob locator is empty")]
    EmptyLocator,

    #[error("invalid blob locator '{0}'")]
    InvalidLocator(String),

    #[error("no blob source configured for scheme '{0}'")]
    UnsupportedScheme(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("object store: {0}")]
    ObjectStore(String),
}

/// Every way a single import job can fail. The orchestrator turns each of
/// these into a `failed` status with the display text as the error text.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unknown tenant '{0}'")]
    UnknownTenant(String),

    #[error("source unavailable '{locator}': {source}")]
    SourceUnavailable {
        locator: String,
        #[source]
        source: BlobError,
    },

    #[error("parse error: {0}")]
    Parse(ParseError),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("job cancelled during shutdown")]
    Cancelled,
}

impl ImportError {
    /// Stable machine-readable category, recorded in log context.
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::Validation(ValidationError::UnsupportedProduct(_)) => "unsupported_product",
            ImportError::Validation(ValidationError::InvalidTableName(_)) => "invalid_table_name",
            ImportError::Validation(ValidationError::MissingField { .. }) => "missing_field",
            ImportError::UnknownTenant(_) => "unknown_tenant",
            ImportError::SourceUnavailable { .. } => "source_unavailable",
            ImportError::Parse(_) => "parse",
            ImportError::UnsupportedFormat(_) => "unsupported_format",
            ImportError::Storage(_) => "storage",
            ImportError::Cancelled => "cancelled",
        }
    }
}

impl From<ParseError> for ImportError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnsupportedFormat(content_type) => ImportError::UnsupportedFormat(content_type),
            other => ImportError::Parse(other),
        }
    }
}

impl From<sqlx::Error> for ImportError {
    fn from(err: sqlx::Error) -> Self {
        ImportError::Storage(StorageError::Database(err))
    }
}

/// Errors returned from REST handlers
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Storage(e) => {
                tracing::error!(error = %e, "Storage error in request");
                (StatusCode::INTERNAL_SERVER_ERROR, "A storage error occurred".to_string())
            },
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}
