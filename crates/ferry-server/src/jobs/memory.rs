//! In-process job store
//!
//! Same contract as [`super::PgJobStore`], held behind one mutex. Used by
//! the pipeline, worker and REST tests.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

use super::model::{Job, JobLogEntry, JobStatus, LogSeverity};
use super::store::JobStore;
use crate::error::{StorageError, StorageResult};

#[derive(Default)]
struct State {
    jobs: Vec<Job>,
    logs: Vec<JobLogEntry>,
    failing_claims: usize,
    failing_logs: usize,
}

#[derive(Default)]
pub struct InMemoryJobStore {
    state: Mutex<State>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` claims fail with a storage error.
    pub fn fail_next_claims(&self, n: usize) {
        self.lock().failing_claims = n;
    }

    /// Make the next `n` log writes fail with a storage error.
    pub fn fail_next_logs(&self, n: usize) {
        self.lock().failing_logs = n;
    }

    /// Queue-level entries (no job id), oldest first.
    pub fn queue_logs(&self) -> Vec<JobLogEntry> {
        self.lock()
            .logs
            .iter()
            .filter(|entry| entry.job_id.is_none())
            .cloned()
            .collect()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.lock().jobs.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // a panic while holding the lock cannot leave State half-written
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn finish(&self, job_id: i64, target: JobStatus, error_text: Option<&str>) -> StorageResult<()> {
        let mut state = self.lock();
        let job = state
            .jobs
            .iter_mut()
            .find(|job| job.id == job_id)
            .ok_or(StorageError::NotFound(job_id))?;

        if job.status != JobStatus::Running {
            return Err(StorageError::InvalidTransition {
                job_id,
                current: job.status,
                target,
            });
        }

        let now = Utc::now();
        job.status = target;
        job.finished_at = Some(now);
        job.updated_at = now;
        if let Some(text) = error_text {
            job.error_text = Some(text.to_string());
        }
        Ok(())
    }
}

fn injected_failure(what: &str) -> StorageError {
    StorageError::Database(sqlx::Error::Protocol(format!("injected {} failure", what)))
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(
        &self,
        tenant_id: &str,
        product_type: &str,
        blob_uri: &str,
    ) -> StorageResult<i64> {
        let mut state = self.lock();
        let id = state.jobs.len() as i64 + 1;
        let now = Utc::now();
        state.jobs.push(Job {
            id,
            tenant_id: tenant_id.to_string(),
            product_type: product_type.to_string(),
            blob_uri: blob_uri.to_string(),
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
            error_text: None,
        });
        Ok(id)
    }

    async fn claim_next(&self) -> StorageResult<Option<Job>> {
        let mut state = self.lock();
        if state.failing_claims > 0 {
            state.failing_claims -= 1;
            return Err(injected_failure("claim"));
        }

        let next = state
            .jobs
            .iter_mut()
            .filter(|job| job.status == JobStatus::Queued)
            .min_by_key(|job| (job.created_at, job.id));

        Ok(next.map(|job| {
            let now = Utc::now();
            job.status = JobStatus::Running;
            job.started_at = Some(now);
            job.updated_at = now;
            job.clone()
        }))
    }

    async fn complete(&self, job_id: i64) -> StorageResult<()> {
        self.finish(job_id, JobStatus::Succeeded, None)
    }

    async fn fail(&self, job_id: i64, error_text: &str) -> StorageResult<()> {
        self.finish(job_id, JobStatus::Failed, Some(error_text))
    }

    async fn log(
        &self,
        job_id: Option<i64>,
        level: LogSeverity,
        message: &str,
        context: Option<Value>,
    ) -> StorageResult<()> {
        let mut state = self.lock();
        if state.failing_logs > 0 {
            state.failing_logs -= 1;
            return Err(injected_failure("log"));
        }

        let id = state.logs.len() as i64 + 1;
        state.logs.push(JobLogEntry {
            id,
            job_id,
            level,
            message: message.to_string(),
            context,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn get(&self, job_id: i64) -> StorageResult<Option<Job>> {
        Ok(self.lock().jobs.iter().find(|job| job.id == job_id).cloned())
    }

    async fn logs(&self, job_id: i64) -> StorageResult<Vec<JobLogEntry>> {
        Ok(self
            .lock()
            .logs
            .iter()
            .filter(|entry| entry.job_id == Some(job_id))
            .cloned()
            .collect())
    }
}
