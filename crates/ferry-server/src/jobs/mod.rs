//! Job store: durable import jobs and their append-only log trail
//!
//! Jobs move `queued -> running -> {succeeded, failed}` and never back.
//! Only [`JobStore::claim_next`] performs `queued -> running`; only
//! [`JobStore::complete`] and [`JobStore::fail`] leave `running`.

pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use memory::InMemoryJobStore;
pub use model::{Job, JobLogEntry, JobStatus, LogSeverity};
pub use postgres::PgJobStore;
pub use store::JobStore;
