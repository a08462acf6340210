//! REST front door
//!
//! Thin HTTP surface over the job store: enqueue a job and read back its
//! status and log trail. Everything else happens in the worker pool.

pub mod jobs;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;

use crate::db;
use crate::jobs::JobStore;
use crate::middleware;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn JobStore>,
    /// Pinged by `/health`. Absent when the store is not Postgres-backed.
    pub db: Option<PgPool>,
}

impl ApiState {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store, db: None }
    }

    pub fn with_db(mut self, db: PgPool) -> Self {
        self.db = Some(db);
        self
    }
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", jobs::jobs_routes())
        .with_state(state)
        .layer(ServiceBuilder::new().layer(middleware::tracing_layer()))
}

async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    let Some(pool) = &state.db else {
        return (StatusCode::OK, Json(json!({ "status": "healthy" })));
    };

    match db::health_check(pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "database": "connected" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "database": "unreachable" })),
            )
        },
    }
}
