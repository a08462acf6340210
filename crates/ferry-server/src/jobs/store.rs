//! Job store contract

use async_trait::async_trait;
use serde_json::Value;

use super::model::{Job, JobLogEntry, LogSeverity};
use crate::error::StorageResult;

/// Durable job queue operations.
///
/// Implementations must make `claim_next` safe under concurrent callers:
/// no job is ever handed to two claimants, and claimants never wait on
/// each other's locks.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new `queued` job. Tenant and product type are not checked here.
    async fn enqueue(&self, tenant_id: &str, product_type: &str, blob_uri: &str)
        -> StorageResult<i64>;

    /// Move the oldest unlocked `queued` job to `running` and return it.
    /// `Ok(None)` means the queue is empty.
    async fn claim_next(&self) -> StorageResult<Option<Job>>;

    /// `running -> succeeded`
    async fn complete(&self, job_id: i64) -> StorageResult<()>;

    /// `running -> failed`, recording the error text
    async fn fail(&self, job_id: i64, error_text: &str) -> StorageResult<()>;

    /// Append a log entry. `None` records a queue-level event.
    async fn log(
        &self,
        job_id: Option<i64>,
        level: LogSeverity,
        message: &str,
        context: Option<Value>,
    ) -> StorageResult<()>;

    async fn get(&self, job_id: i64) -> StorageResult<Option<Job>>;

    /// Log entries for one job, oldest first.
    async fn logs(&self, job_id: i64) -> StorageResult<Vec<JobLogEntry>>;
}
