//! Startup-time file loading
//!
//! Route tables and JSON configuration files are read once when a process
//! starts. Errors carry the offending path so operators can find the file.

use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::{FerryError, Result};

/// Read and deserialize a JSON document from disk.
pub fn load_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let raw = std::fs::read(path).map_err(|source| FerryError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), bytes = raw.len(), "Loaded JSON file");

    serde_json::from_slice(&raw).map_err(|source| FerryError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}
