//! Ferry Server Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Multi-tenant file import queue. Callers enqueue "import this file for
//! this tenant as this product type"; a pool of workers claims queued jobs
//! from PostgreSQL, streams the file through a format-specific parser,
//! validates each batch against the product schema and writes the records
//! into the tenant's own database.
//!
//! # Components
//!
//! - **Job store** ([`jobs`]): durable jobs and log trail, claimed with
//!   `FOR UPDATE SKIP LOCKED` so concurrent workers never share a job
//! - **Tenant router** ([`tenant`]): tenant id to a fresh connection on the
//!   tenant's store
//! - **Record stream parser** ([`parser`]): CSV, TSV and `key=value` files
//!   as lazy record streams, whole or batched
//! - **Schema validator** ([`schema`]): required fields per product type
//! - **Pipeline** ([`pipeline`]): one job from claim to terminal status
//! - **Worker pool** ([`worker`]): bounded executors fed by one dispatcher,
//!   with graceful drain and abort on shutdown
//!
//! # Example
//!
//! ```no_run
//! use ferry_server::{
//!     blob::FileBlobSource, jobs::PgJobStore, pipeline::ImportPipeline,
//!     tenant::{PgTenantRouter, TenantRoutes}, worker::{WorkerPool, WorkerPoolConfig},
//! };
//! use std::{sync::Arc, time::Duration};
//!
//! # async fn run(pool: sqlx::PgPool) -> anyhow::Result<()> {
//! let store = Arc::new(PgJobStore::new(pool));
//! let routes = TenantRoutes::from_json_file("tenant_map.json")?;
//! let pipeline = ImportPipeline::new(
//!     store.clone(),
//!     Arc::new(PgTenantRouter::new(routes)),
//!     Arc::new(FileBlobSource::new()),
//! );
//!
//! let handle = WorkerPool::new(store, Arc::new(pipeline), WorkerPoolConfig::default()).start();
//! tokio::signal::ctrl_c().await?;
//! handle.shutdown(Duration::from_secs(30)).await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod app;
pub mod blob;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod middleware;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod tenant;
pub mod worker;

#[cfg(test)]
pub mod testing;

pub use error::{AppError, ImportError, StorageError, StorageResult};
