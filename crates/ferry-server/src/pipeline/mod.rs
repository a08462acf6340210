//! Pipeline orchestrator: runs one claimed job to a terminal status
//!
//! Steps, in order. The first failure skips the rest and fails the job:
//!
//! 1. log `job started`
//! 2. check the product type against the supported set
//! 3. open a connection to the tenant's store
//! 4. open the blob
//! 5. ensure the destination table exists
//! 6. stream-parse in batches; validate each batch, then insert its records
//!    one row at a time
//!
//! Then exactly one of `complete` or `fail` is called. Inserts are not
//! transactional across rows: a failure mid-file leaves earlier rows in place.

use futures::TryStreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::blob::BlobSource;
use crate::error::{BlobError, ImportError, ParseError, StorageError};
use crate::jobs::{Job, JobStore, LogSeverity};
use crate::parser::{ParserRegistry, DEFAULT_BATCH_SIZE};
use crate::schema::{ProductSchema, ProductType};
use crate::tenant::{TableName, TenantConnection, TenantConnector};

/// How a processed job ended.
#[derive(Debug)]
pub enum JobOutcome {
    Succeeded {
        records: usize,
        batches: usize,
        elapsed: Duration,
    },
    Failed {
        error: ImportError,
    },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// The terminal status or the final log entry could not be written.
#[derive(Error, Debug)]
pub enum FinalizeError {
    #[error("failed to record terminal status for job {job_id}: {source}")]
    Status {
        job_id: i64,
        #[source]
        source: StorageError,
    },

    #[error("job {job_id} was finalized but its final log entry was not written: {source}")]
    Log {
        job_id: i64,
        #[source]
        source: StorageError,
    },
}

#[derive(Debug, Default, Clone, Copy)]
struct ImportSummary {
    records: usize,
    batches: usize,
}

pub struct ImportPipeline {
    store: Arc<dyn JobStore>,
    tenants: Arc<dyn TenantConnector>,
    blobs: Arc<dyn BlobSource>,
    parsers: Arc<ParserRegistry>,
    batch_size: usize,
}

impl ImportPipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        tenants: Arc<dyn TenantConnector>,
        blobs: Arc<dyn BlobSource>,
    ) -> Self {
        Self {
            store,
            tenants,
            blobs,
            parsers: Arc::new(ParserRegistry::default()),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_parsers(mut self, parsers: Arc<ParserRegistry>) -> Self {
        self.parsers = parsers;
        self
    }

    /// Zero selects the default batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Process one `running` job and finalize it.
    ///
    /// Import failures never surface as `Err`: they fail the job and come
    /// back as [`JobOutcome::Failed`]. `Err` means the store rejected the
    /// status update or the final log entry. In the log case the status has
    /// already been written and stands.
    ///
    /// Cancelling `abort` interrupts in-flight I/O; the job then fails with
    /// [`ImportError::Cancelled`].
    #[instrument(
        skip(self, job, abort),
        fields(job_id = job.id, tenant = %job.tenant_id, product = %job.product_type)
    )]
    pub async fn process_job(
        &self,
        job: &Job,
        abort: &CancellationToken,
    ) -> Result<JobOutcome, FinalizeError> {
        let started = Instant::now();
        let started_at = job.started_at.unwrap_or_else(chrono::Utc::now);

        let context = json!({
            "tenant_id": job.tenant_id,
            "product_type": job.product_type,
            "blob_uri": job.blob_uri,
            "started_at": started_at,
        });
        if let Err(e) = self
            .store
            .log(Some(job.id), LogSeverity::Info, "job started", Some(context))
            .await
        {
            warn!(error = %e, "Failed to write job start log");
        }

        let result = self.run(job, abort).await;
        let elapsed = started.elapsed();

        match result {
            Ok(summary) => {
                info!(records = summary.records, elapsed_ms = elapsed.as_millis() as u64, "Job succeeded");
                let log = self
                    .store
                    .log(
                        Some(job.id),
                        LogSeverity::Info,
                        "job completed",
                        Some(json!({
                            "processed_records": summary.records,
                            "batches": summary.batches,
                            "duration_ms": elapsed.as_millis() as u64,
                        })),
                    )
                    .await;

                self.store
                    .complete(job.id)
                    .await
                    .map_err(|source| FinalizeError::Status { job_id: job.id, source })?;
                log.map_err(|source| FinalizeError::Log { job_id: job.id, source })?;

                Ok(JobOutcome::Succeeded {
                    records: summary.records,
                    batches: summary.batches,
                    elapsed,
                })
            },
            Err(err) => {
                let error_text = err.to_string();
                error!(error = %error_text, kind = err.kind(), "Job failed");
                let log = self
                    .store
                    .log(
                        Some(job.id),
                        LogSeverity::Error,
                        "job failed",
                        Some(json!({
                            "error": error_text,
                            "kind": err.kind(),
                            "duration_ms": elapsed.as_millis() as u64,
                        })),
                    )
                    .await;

                self.store
                    .fail(job.id, &error_text)
                    .await
                    .map_err(|source| FinalizeError::Status { job_id: job.id, source })?;
                log.map_err(|source| FinalizeError::Log { job_id: job.id, source })?;

                Ok(JobOutcome::Failed { error: err })
            },
        }
    }

    async fn run(
        &self,
        job: &Job,
        abort: &CancellationToken,
    ) -> Result<ImportSummary, ImportError> {
        let schema = job.product_type.parse::<ProductType>()?.schema();
        let table = TableName::new(schema.table)?;

        let mut conn = tokio::select! {
            biased;
            _ = abort.cancelled() => return Err(ImportError::Cancelled),
            conn = self.tenants.resolve_connection(&job.tenant_id) => conn?,
        };

        // the connection is closed whether the import finished or was aborted
        let result = tokio::select! {
            biased;
            _ = abort.cancelled() => Err(ImportError::Cancelled),
            result = self.import(conn.as_mut(), job, schema, &table) => result,
        };

        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close tenant connection");
        }
        result
    }

    async fn import(
        &self,
        conn: &mut dyn TenantConnection,
        job: &Job,
        schema: &ProductSchema,
        table: &TableName,
    ) -> Result<ImportSummary, ImportError> {
        let input = self
            .blobs
            .open(&job.blob_uri)
            .await
            .map_err(|source| ImportError::SourceUnavailable {
                locator: job.blob_uri.clone(),
                source,
            })?;

        conn.ensure_table(table).await?;
        if let Err(e) = self
            .store
            .log(
                Some(job.id),
                LogSeverity::Info,
                "target table ensured",
                Some(json!({ "table": table.as_str() })),
            )
            .await
        {
            warn!(error = %e, "Failed to write table log");
        }

        let mut batches = self.parsers.batches(&job.blob_uri, input, self.batch_size)?;
        let mut summary = ImportSummary::default();

        while let Some(batch) = batches
            .try_next()
            .await
            .map_err(|e| read_failure(&job.blob_uri, e))?
        {
            schema.validate(batch.offset, &batch.records)?;

            for record in &batch.records {
                conn.insert(table, &record.to_document()).await?;
                summary.records += 1;
            }
            summary.batches += 1;

            debug!(
                offset = batch.offset,
                size = batch.records.len(),
                total = summary.records,
                "Batch inserted"
            );
        }

        Ok(summary)
    }
}

/// I/O errors while reading the blob mean the source went away mid-read.
/// The parsers report undecodable content as a parse error instead.
fn read_failure(locator: &str, err: ParseError) -> ImportError {
    match err {
        ParseError::Io(source) => ImportError::SourceUnavailable {
            locator: locator.to_string(),
            source: BlobError::Io(source),
        },
        other => other.into(),
    }
}
