//! Ferry Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared pieces used by the ferry server and CLI:
//!
//! - **Logging**: `tracing` subscriber setup driven by environment or builder
//! - **Errors**: the base error type for file and configuration loading
//! - **Files**: JSON document loading for startup-time configuration
//!
//! # Example
//!
//! ```no_run
//! use ferry_common::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_env().unwrap_or_default();
//! let _guard = init_logging(&config);
//! tracing::info!("ready");
//! ```

pub mod error;
pub mod files;
pub mod logging;

pub use error::{FerryError, Result};
