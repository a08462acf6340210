//! PostgreSQL job store
//!
//! Claims use `FOR UPDATE SKIP LOCKED` so that any number of dispatchers,
//! in one process or many, can poll the same table. A row locked by one
//! claimant is invisible to the others until that transaction ends, by
//! which point its status is no longer `queued`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{types::Json, FromRow, PgPool};
use tracing::{debug, instrument};

use super::model::{Job, JobLogEntry, JobStatus, LogSeverity};
use super::store::JobStore;
use crate::error::{StorageError, StorageResult};

const JOB_COLUMNS: &str = "id, tenant_id, product_type, blob_uri, status, created_at, \
                           updated_at, started_at, finished_at, error_text";

#[derive(Debug, FromRow)]
struct JobRow {
    id: i64,
    tenant_id: String,
    product_type: String,
    blob_uri: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    error_text: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = StorageError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|status| StorageError::UnknownStatus { job_id: row.id, status })?;

        Ok(Job {
            id: row.id,
            tenant_id: row.tenant_id,
            product_type: row.product_type,
            blob_uri: row.blob_uri,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
            error_text: row.error_text,
        })
    }
}

#[derive(Debug, FromRow)]
struct LogRow {
    id: i64,
    job_id: Option<i64>,
    level: String,
    message: String,
    context: Option<Json<Value>>,
    created_at: DateTime<Utc>,
}

impl From<LogRow> for JobLogEntry {
    fn from(row: LogRow) -> Self {
        JobLogEntry {
            id: row.id,
            job_id: row.job_id,
            // the table's CHECK constraint keeps this in range
            level: row.level.parse().unwrap_or(LogSeverity::Info),
            message: row.message,
            context: row.context.map(|Json(value)| value),
            created_at: row.created_at,
        }
    }
}

/// Job store backed by the central PostgreSQL database
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Leave `running` for `target`. Zero rows touched means the job is
    /// missing or not running; look it up to report which.
    async fn finish(
        &self,
        job_id: i64,
        target: JobStatus,
        error_text: Option<&str>,
    ) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE import_jobs
            SET status = $2, finished_at = now(), error_text = COALESCE($3, error_text)
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind(target.as_str())
        .bind(error_text)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM import_jobs WHERE id = $1")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            None => Err(StorageError::NotFound(job_id)),
            Some(status) => Err(StorageError::InvalidTransition {
                job_id,
                current: status
                    .parse()
                    .map_err(|status| StorageError::UnknownStatus { job_id, status })?,
                target,
            }),
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    #[instrument(skip(self))]
    async fn enqueue(
        &self,
        tenant_id: &str,
        product_type: &str,
        blob_uri: &str,
    ) -> StorageResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO import_jobs (tenant_id, product_type, blob_uri, status)
            VALUES ($1, $2, $3, 'queued')
            RETURNING id
            "#,
        )
        .bind(tenant_id)
        .bind(product_type)
        .bind(blob_uri)
        .fetch_one(&self.pool)
        .await?;

        debug!(job_id = id, "Job enqueued");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn claim_next(&self) -> StorageResult<Option<Job>> {
        let sql = format!(
            r#"
            UPDATE import_jobs
            SET status = 'running', started_at = now()
            WHERE id = (
                SELECT id FROM import_jobs
                WHERE status = 'queued'
                ORDER BY created_at, id
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING {JOB_COLUMNS}
            "#
        );

        let row: Option<JobRow> = sqlx::query_as(&sql).fetch_optional(&self.pool).await?;

        row.map(Job::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn complete(&self, job_id: i64) -> StorageResult<()> {
        self.finish(job_id, JobStatus::Succeeded, None).await
    }

    #[instrument(skip(self, error_text))]
    async fn fail(&self, job_id: i64, error_text: &str) -> StorageResult<()> {
        self.finish(job_id, JobStatus::Failed, Some(error_text)).await
    }

    #[instrument(skip(self, message, context), fields(level = level.as_str()))]
    async fn log(
        &self,
        job_id: Option<i64>,
        level: LogSeverity,
        message: &str,
        context: Option<Value>,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO import_logs (job_id, level, message, context)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(job_id)
        .bind(level.as_str())
        .bind(message)
        .bind(context.map(Json))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, job_id: i64) -> StorageResult<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM import_jobs WHERE id = $1");
        let row: Option<JobRow> = sqlx::query_as(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }

    async fn logs(&self, job_id: i64) -> StorageResult<Vec<JobLogEntry>> {
        let rows: Vec<LogRow> = sqlx::query_as(
            r#"
            SELECT id, job_id, level, message, context, created_at
            FROM import_logs
            WHERE job_id = $1
            ORDER BY id
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(JobLogEntry::from).collect())
    }
}
