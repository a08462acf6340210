//! Tenant router
//!
//! Maps a tenant id to a connection on that tenant's own data store. The
//! route table is loaded once and never changes; connections are opened per
//! job and closed by the job that opened them.

pub mod postgres;
pub mod routes;
pub mod table;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ImportError;

pub use postgres::PgTenantRouter;
pub use routes::TenantRoutes;
pub use table::TableName;

/// Resolves tenants to fresh, caller-owned connections.
#[async_trait]
pub trait TenantConnector: Send + Sync {
    /// Fails with [`ImportError::UnknownTenant`] without attempting any
    /// connection when the tenant has no route.
    async fn resolve_connection(
        &self,
        tenant_id: &str,
    ) -> Result<Box<dyn TenantConnection>, ImportError>;
}

/// One open connection to a tenant store.
#[async_trait]
pub trait TenantConnection: Send {
    /// Create the destination table if it does not exist. Idempotent.
    async fn ensure_table(&mut self, table: &TableName) -> Result<(), ImportError>;

    /// Append one document as a new row. Each call commits on its own.
    async fn insert(&mut self, table: &TableName, document: &Value) -> Result<(), ImportError>;

    /// Release the connection.
    async fn close(self: Box<Self>) -> Result<(), ImportError>;
}
