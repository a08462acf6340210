//! Shared harness for integration tests backed by a PostgreSQL container
//!
//! One container hosts both the central job database (`postgres`, with
//! migrations applied) and any tenant databases a test creates.
//!
//! ```no_run
//! mod common;
//! use common::TestPostgres;
//!
//! #[tokio::test]
//! #[ignore = "requires Docker"]
//! async fn test_something() {
//!     let pg = TestPostgres::start().await.unwrap();
//!     let tenant_dsn = pg.create_database("tenant_acme").await.unwrap();
//! }
//! ```

#![allow(dead_code)]

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Once;
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

static TRACING: Once = Once::new();

/// Route test logs through the test writer. `RUST_LOG` selects the level.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct TestPostgres {
    container: ContainerAsync<Postgres>,
    pool: PgPool,
    host: String,
    port: u16,
}

impl TestPostgres {
    /// Start a container and apply the job store migrations.
    pub async fn start() -> Result<Self> {
        init_test_tracing();
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?
            .to_string();
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let pg = Self {
            pool: connect(&dsn(&host, port, "postgres"), 10).await?,
            container,
            host,
            port,
        };

        sqlx::migrate!("../../migrations")
            .run(&pg.pool)
            .await
            .context("Failed to run migrations")?;
        debug!("Migrations applied");

        Ok(pg)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn connection_string(&self) -> String {
        dsn(&self.host, self.port, "postgres")
    }

    /// Create an empty database on the same server and return its DSN.
    pub async fn create_database(&self, name: &str) -> Result<String> {
        sqlx::query(&format!("CREATE DATABASE \"{name}\""))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to create database {name}"))?;
        Ok(dsn(&self.host, self.port, name))
    }

    /// Pool on another database of this server.
    pub async fn connect_to(&self, name: &str) -> Result<PgPool> {
        connect(&dsn(&self.host, self.port, name), 2).await
    }
}

fn dsn(host: &str, port: u16, database: &str) -> String {
    format!("postgresql://postgres:postgres@{host}:{port}/{database}")
}

async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(url)
        .await
        .context("Failed to connect to PostgreSQL")
}
