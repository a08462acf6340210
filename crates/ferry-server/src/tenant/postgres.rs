//! PostgreSQL tenant stores
//!
//! Each job gets its own unpooled `PgConnection`. Destination tables share
//! one shape: `id BIGSERIAL`, `data JSONB`, `created_at TIMESTAMPTZ`.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, Connection, PgConnection};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{routes::TenantRoutes, table::TableName, TenantConnection, TenantConnector};
use crate::error::{ImportError, StorageError};

/// Default time allowed to open a tenant connection.
pub const DEFAULT_TENANT_CONNECT_TIMEOUT_SECS: u64 = 10;

// duplicate_table / unique_violation on pg_type: a concurrent CREATE won the race
const RACED_CREATE_CODES: [&str; 2] = ["42P07", "23505"];

pub struct PgTenantRouter {
    routes: TenantRoutes,
    connect_timeout: Duration,
}

impl PgTenantRouter {
    pub fn new(routes: TenantRoutes) -> Self {
        Self {
            routes,
            connect_timeout: Duration::from_secs(DEFAULT_TENANT_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn routes(&self) -> &TenantRoutes {
        &self.routes
    }
}

#[async_trait]
impl TenantConnector for PgTenantRouter {
    #[instrument(skip(self))]
    async fn resolve_connection(
        &self,
        tenant_id: &str,
    ) -> Result<Box<dyn TenantConnection>, ImportError> {
        let dsn = self
            .routes
            .resolve(tenant_id)
            .ok_or_else(|| ImportError::UnknownTenant(tenant_id.to_string()))?;

        let conn = tokio::time::timeout(self.connect_timeout, PgConnection::connect(dsn))
            .await
            .map_err(|_| {
                StorageError::Database(sqlx::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("tenant connection timed out after {:?}", self.connect_timeout),
                )))
            })??;

        debug!("Tenant connection opened");

        Ok(Box::new(PgTenantConnection {
            conn,
            tenant_id: tenant_id.to_string(),
        }))
    }
}

pub struct PgTenantConnection {
    conn: PgConnection,
    tenant_id: String,
}

#[async_trait]
impl TenantConnection for PgTenantConnection {
    async fn ensure_table(&mut self, table: &TableName) -> Result<(), ImportError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                id BIGSERIAL PRIMARY KEY, \
                data JSONB NOT NULL, \
                created_at TIMESTAMPTZ NOT NULL DEFAULT now())",
            table.quoted()
        );

        match sqlx::query(&ddl).execute(&mut self.conn).await {
            Ok(_) => {},
            Err(sqlx::Error::Database(e))
                if e.code().is_some_and(|code| RACED_CREATE_CODES.contains(&code.as_ref())) =>
            {
                debug!(tenant = %self.tenant_id, table = %table, "Table created concurrently");
            },
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }

    async fn insert(&mut self, table: &TableName, document: &Value) -> Result<(), ImportError> {
        let sql = format!("INSERT INTO {} (data) VALUES ($1)", table.quoted());
        sqlx::query(&sql)
            .bind(Json(document))
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), ImportError> {
        self.conn.close().await?;
        Ok(())
    }
}
