//! Job routes
//!
//! - `POST /jobs` enqueue an import, returns `{"job_id": ..}`
//! - `GET /jobs/:job_id` current job record
//! - `GET /jobs/:job_id/logs` the job's log trail, oldest first

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::error::AppError;
use crate::jobs::{Job, JobLogEntry, JobStore};

pub fn jobs_routes() -> Router<ApiState> {
    Router::new()
        .route("/jobs", post(enqueue_job))
        .route("/jobs/:job_id", get(get_job))
        .route("/jobs/:job_id/logs", get(get_job_logs))
}

/// Request to import one file for one tenant.
///
/// Tenant and product type are not checked here; an unknown tenant or
/// unsupported product fails the job when a worker picks it up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueJobCommand {
    #[serde(alias = "customer_id")]
    pub tenant_id: String,
    pub product_type: String,
    pub blob_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueJobResponse {
    pub job_id: i64,
}

impl EnqueueJobCommand {
    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [
            ("tenant_id", &self.tenant_id),
            ("product_type", &self.product_type),
            ("blob_uri", &self.blob_uri),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{field} cannot be empty")));
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, store), fields(tenant = %self.tenant_id, product = %self.product_type))]
    pub async fn handle(self, store: &dyn JobStore) -> Result<EnqueueJobResponse, AppError> {
        self.validate()?;
        let job_id = store
            .enqueue(&self.tenant_id, &self.product_type, &self.blob_uri)
            .await?;
        tracing::info!(job_id, "Job enqueued");
        Ok(EnqueueJobResponse { job_id })
    }
}

async fn enqueue_job(
    State(state): State<ApiState>,
    Json(command): Json<EnqueueJobCommand>,
) -> Result<impl IntoResponse, AppError> {
    let response = command.handle(state.store.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_job(
    State(state): State<ApiState>,
    Path(job_id): Path<i64>,
) -> Result<Json<Job>, AppError> {
    state
        .store
        .get(job_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))
}

async fn get_job_logs(
    State(state): State<ApiState>,
    Path(job_id): Path<i64>,
) -> Result<Json<Vec<JobLogEntry>>, AppError> {
    if state.store.get(job_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Job {job_id} not found")));
    }
    Ok(Json(state.store.logs(job_id).await?))
}
