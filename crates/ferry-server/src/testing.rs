//! In-memory collaborators for unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::blob::{BlobSource, BlobStream};
use crate::error::{BlobError, ImportError, StorageError};
use crate::tenant::{TableName, TenantConnection, TenantConnector};

/// Reader that fails every read with the given error kind.
pub struct FailingRead {
    kind: io::ErrorKind,
}

impl FailingRead {
    pub fn new(kind: io::ErrorKind) -> Self {
        Self { kind }
    }
}

impl AsyncRead for FailingRead {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(self.kind, "stream dropped mid-read")))
    }
}

/// Blobs served from memory. Stalled locators never finish opening;
/// broken ones serve their content and then fail the next read.
#[derive(Default)]
pub struct MemoryBlobSource {
    blobs: HashMap<String, Vec<u8>>,
    broken: HashSet<String>,
    stalled: HashSet<String>,
    open_delay: Option<Duration>,
    pub opened: AtomicUsize,
}

impl MemoryBlobSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(mut self, locator: &str, content: &str) -> Self {
        self.blobs.insert(locator.to_string(), content.as_bytes().to_vec());
        self
    }

    pub fn with_bytes(mut self, locator: &str, content: &[u8]) -> Self {
        self.blobs.insert(locator.to_string(), content.to_vec());
        self
    }

    pub fn with_broken(mut self, locator: &str, content: &str) -> Self {
        self.broken.insert(locator.to_string());
        self.with_blob(locator, content)
    }

    pub fn with_stalled(mut self, locator: &str) -> Self {
        self.stalled.insert(locator.to_string());
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }
}

#[async_trait]
impl BlobSource for MemoryBlobSource {
    async fn open(&self, locator: &str) -> Result<BlobStream, BlobError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.stalled.contains(locator) {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }

        let content = self.blobs.get(locator).cloned().ok_or_else(|| {
            BlobError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no blob at {locator}"),
            ))
        })?;
        let content = Cursor::new(content);
        if self.broken.contains(locator) {
            return Ok(Box::pin(
                content.chain(FailingRead::new(io::ErrorKind::ConnectionReset)),
            ));
        }
        Ok(Box::pin(content))
    }
}

#[derive(Default)]
struct ConnectorState {
    tables: HashMap<(String, String), Vec<Value>>,
}

/// Tenant connector that records everything written through it.
#[derive(Default)]
pub struct RecordingConnector {
    tenants: HashSet<String>,
    fail_insert_at: Option<usize>,
    state: Arc<Mutex<ConnectorState>>,
    pub connect_attempts: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    inserts: Arc<AtomicUsize>,
}

impl RecordingConnector {
    pub fn new(tenants: &[&str]) -> Self {
        Self {
            tenants: tenants.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Fail the insert with this zero-based sequence number.
    pub fn failing_insert_at(mut self, n: usize) -> Self {
        self.fail_insert_at = Some(n);
        self
    }

    pub fn rows(&self, tenant: &str, table: &str) -> Vec<Value> {
        self.state
            .lock()
            .map(|state| {
                state
                    .tables
                    .get(&(tenant.to_string(), table.to_string()))
                    .cloned()
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    pub fn table_exists(&self, tenant: &str, table: &str) -> bool {
        self.state
            .lock()
            .map(|state| state.tables.contains_key(&(tenant.to_string(), table.to_string())))
            .unwrap_or(false)
    }
}

#[async_trait]
impl TenantConnector for RecordingConnector {
    async fn resolve_connection(
        &self,
        tenant_id: &str,
    ) -> Result<Box<dyn TenantConnection>, ImportError> {
        if !self.tenants.contains(tenant_id) {
            return Err(ImportError::UnknownTenant(tenant_id.to_string()));
        }
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(RecordingConnection {
            tenant: tenant_id.to_string(),
            state: self.state.clone(),
            closed: self.closed.clone(),
            inserts: self.inserts.clone(),
            fail_insert_at: self.fail_insert_at,
        }))
    }
}

struct RecordingConnection {
    tenant: String,
    state: Arc<Mutex<ConnectorState>>,
    closed: Arc<AtomicUsize>,
    inserts: Arc<AtomicUsize>,
    fail_insert_at: Option<usize>,
}

#[async_trait]
impl TenantConnection for RecordingConnection {
    async fn ensure_table(&mut self, table: &TableName) -> Result<(), ImportError> {
        if let Ok(mut state) = self.state.lock() {
            state
                .tables
                .entry((self.tenant.clone(), table.to_string()))
                .or_default();
        }
        Ok(())
    }

    async fn insert(&mut self, table: &TableName, document: &Value) -> Result<(), ImportError> {
        let seq = self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert_at == Some(seq) {
            return Err(ImportError::Storage(StorageError::Database(
                sqlx::Error::Protocol("insert rejected".to_string()),
            )));
        }

        if let Ok(mut state) = self.state.lock() {
            state
                .tables
                .entry((self.tenant.clone(), table.to_string()))
                .or_default()
                .push(document.clone());
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), ImportError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
