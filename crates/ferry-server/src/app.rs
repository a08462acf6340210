//! Process wiring shared by the server binary and the CLI

use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::blob::{FileBlobSource, S3BlobSource, S3Config, SchemeBlobSource};
use crate::config::Config;
use crate::db;
use crate::jobs::PgJobStore;
use crate::pipeline::ImportPipeline;
use crate::tenant::{PgTenantRouter, TenantRoutes};
use crate::worker::WorkerPool;

/// Everything a worker process needs, built once at startup.
pub struct Services {
    pub pool: PgPool,
    pub store: Arc<PgJobStore>,
    pub pipeline: Arc<ImportPipeline>,
}

impl Services {
    /// Connect to the central database, apply migrations, load the tenant
    /// routes and assemble the pipeline.
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let pool = db::create_pool(&config.db_config())
            .await
            .context("Failed to connect to the job database")?;
        db::run_migrations(&pool).await?;

        let store = Arc::new(PgJobStore::new(pool.clone()));

        let routes = TenantRoutes::from_json_file(&config.tenant_map_path)
            .with_context(|| format!("Failed to load tenant routes from {}", config.tenant_map_path))?;
        info!(tenants = routes.len(), "Tenant routes loaded");

        let mut blobs = SchemeBlobSource::new(FileBlobSource::new());
        if let Some(s3) = S3Config::from_env() {
            blobs = blobs.with_s3(S3BlobSource::new(&s3));
        }

        let pipeline = ImportPipeline::new(
            store.clone(),
            Arc::new(PgTenantRouter::new(routes)),
            Arc::new(blobs),
        )
        .with_batch_size(config.worker.batch_size);

        Ok(Self {
            pool,
            store,
            pipeline: Arc::new(pipeline),
        })
    }

    pub fn worker_pool(&self, config: &Config) -> WorkerPool {
        WorkerPool::new(self.store.clone(), self.pipeline.clone(), config.pool_config())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("Received terminate signal, starting graceful shutdown"),
    }
}
