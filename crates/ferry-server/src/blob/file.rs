//! Local filesystem blobs

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::BufReader;

use super::{BlobSource, BlobStream};
use crate::error::BlobError;

/// Opens `file://` URIs and plain paths. Relative paths resolve against
/// `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FileBlobSource {
    root: Option<PathBuf>,
}

impl FileBlobSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn resolve(&self, locator: &str) -> Result<PathBuf, BlobError> {
        let raw = locator.strip_prefix("file://").unwrap_or(locator);
        if raw.trim().is_empty() {
            return Err(BlobError::EmptyLocator);
        }

        let path = Path::new(raw);
        Ok(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        })
    }
}

#[async_trait]
impl BlobSource for FileBlobSource {
    async fn open(&self, locator: &str) -> Result<BlobStream, BlobError> {
        let path = self.resolve(locator)?;
        let file = File::open(&path).await?;
        tracing::debug!(path = %path.display(), "Opened file blob");
        Ok(Box::pin(BufReader::new(file)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_open_file_uri_and_plain_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.csv");
        std::fs::write(&path, "id\n1\n").unwrap();

        let source = FileBlobSource::new();
        for locator in [format!("file://{}", path.display()), path.display().to_string()] {
            let mut stream = source.open(&locator).await.unwrap();
            let mut content = String::new();
            stream.read_to_string(&mut content).await.unwrap();
            assert_eq!(content, "id\n1\n");
        }
    }

    #[tokio::test]
    async fn test_relative_paths_use_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.csv"), "x").unwrap();

        let source = FileBlobSource::with_root(dir.path());
        assert!(source.open("a.csv").await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_and_empty_locators() {
        let source = FileBlobSource::new();
        assert!(matches!(
            source.open("/definitely/not/here.csv").await.err().unwrap(),
            BlobError::Io(_)
        ));
        assert!(matches!(
            source.open("file://").await.err().unwrap(),
            BlobError::EmptyLocator
        ));
    }
}
