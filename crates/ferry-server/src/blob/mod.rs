//! Blob sources: open a named resource and get a byte stream
//!
//! The pipeline treats a job's blob locator as opaque and hands it to a
//! [`BlobSource`]. [`SchemeBlobSource`] routes by URI scheme:
//! `s3://bucket/key` goes to S3, `file://` URIs and bare paths to disk.

pub mod file;
pub mod s3;

use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

use crate::error::BlobError;

pub use file::FileBlobSource;
pub use s3::{S3BlobSource, S3Config};

/// Readable byte stream of one blob. Dropping it releases the underlying
/// file handle or connection.
pub type BlobStream = Pin<Box<dyn AsyncRead + Send>>;

#[async_trait]
pub trait BlobSource: Send + Sync {
    async fn open(&self, locator: &str) -> Result<BlobStream, BlobError>;
}

/// Scheme of a locator, if it has one (`s3://...` -> `s3`).
pub fn scheme_of(locator: &str) -> Option<&str> {
    locator
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .filter(|scheme| {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        })
}

/// Dispatches to the source registered for the locator's scheme.
pub struct SchemeBlobSource {
    file: FileBlobSource,
    s3: Option<S3BlobSource>,
}

impl SchemeBlobSource {
    pub fn new(file: FileBlobSource) -> Self {
        Self { file, s3: None }
    }

    pub fn with_s3(mut self, s3: S3BlobSource) -> Self {
        self.s3 = Some(s3);
        self
    }
}

#[async_trait]
impl BlobSource for SchemeBlobSource {
    async fn open(&self, locator: &str) -> Result<BlobStream, BlobError> {
        match scheme_of(locator) {
            None | Some("file") => self.file.open(locator).await,
            Some("s3") => match &self.s3 {
                Some(s3) => s3.open(locator).await,
                None => Err(BlobError::UnsupportedScheme("s3".to_string())),
            },
            Some(other) => Err(BlobError::UnsupportedScheme(other.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_of() {
        assert_eq!(scheme_of("s3://bucket/key.csv"), Some("s3"));
        assert_eq!(scheme_of("file:///tmp/a.csv"), Some("file"));
        assert_eq!(scheme_of("/tmp/a.csv"), None);
        assert_eq!(scheme_of("weird path://x"), None);
    }

    #[tokio::test]
    async fn test_unconfigured_schemes_are_rejected() {
        let source = SchemeBlobSource::new(FileBlobSource::new());

        let err = source.open("s3://bucket/a.csv").await.err().unwrap();
        assert!(matches!(err, BlobError::UnsupportedScheme(s) if s == "s3"));

        let err = source.open("ftp://host/a.csv").await.err().unwrap();
        assert!(matches!(err, BlobError::UnsupportedScheme(s) if s == "ftp"));
    }
}
