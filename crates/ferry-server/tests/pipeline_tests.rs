//! End-to-end imports: job store, worker pool and a tenant database on
//! one PostgreSQL container
//!
//! Run with: cargo test --test pipeline_tests -- --ignored

mod common;

use common::TestPostgres;
use ferry_server::blob::FileBlobSource;
use ferry_server::jobs::{Job, JobStatus, JobStore, PgJobStore};
use ferry_server::pipeline::ImportPipeline;
use ferry_server::tenant::{PgTenantRouter, TenantRoutes};
use ferry_server::worker::{WorkerPool, WorkerPoolConfig};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    pg: TestPostgres,
    store: Arc<PgJobStore>,
    files: TempDir,
}

impl Fixture {
    async fn start() -> Self {
        let pg = TestPostgres::start().await.unwrap();
        Self {
            store: Arc::new(PgJobStore::new(pg.pool().clone())),
            pg,
            files: TempDir::new().unwrap(),
        }
    }

    fn write(&self, name: &str, content: &str) -> String {
        let path = self.files.path().join(name);
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    async fn pipeline(&self, tenants: &[(&str, String)]) -> ImportPipeline {
        let routes: TenantRoutes = tenants
            .iter()
            .map(|(tenant, dsn)| (tenant.to_string(), dsn.clone()))
            .collect();
        ImportPipeline::new(
            self.store.clone(),
            Arc::new(PgTenantRouter::new(routes)),
            Arc::new(FileBlobSource::new()),
        )
        .with_batch_size(2)
    }

    async fn claim(&self) -> Job {
        self.store.claim_next().await.unwrap().unwrap()
    }
}

async fn wait_until_terminal(store: &PgJobStore, id: i64) -> Job {
    for _ in 0..200 {
        let job = store.get(id).await.unwrap().unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {id} never finished");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_users_csv_lands_in_tenant_database() {
    let fx = Fixture::start().await;
    let tenant_dsn = fx.pg.create_database("tenant_acme").await.unwrap();
    let pipeline = fx.pipeline(&[("acme", tenant_dsn)]).await;

    let file = fx.write("users.csv", "id,email,name\n1,a@x.com,A\n2,b@x.com,B\n3,c@x.com,C\n");
    let id = fx.store.enqueue("acme", "users", &file).await.unwrap();

    let job = fx.claim().await;
    let outcome = pipeline
        .process_job(&job, &Default::default())
        .await
        .unwrap();
    assert!(outcome.is_success());

    let job = fx.store.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);

    let tenant = fx.pg.connect_to("tenant_acme").await.unwrap();
    let rows: Vec<(Value,)> = sqlx::query_as("SELECT data FROM users ORDER BY id")
        .fetch_all(&tenant)
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].0["email"], "a@x.com");
    assert_eq!(rows[2].0["name"], "C");

    let messages: Vec<String> = fx
        .store
        .logs(id)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.message)
        .collect();
    assert_eq!(messages.first().map(String::as_str), Some("job started"));
    assert_eq!(messages.last().map(String::as_str), Some("job completed"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_missing_field_keeps_committed_batches() {
    let fx = Fixture::start().await;
    let tenant_dsn = fx.pg.create_database("tenant_acme").await.unwrap();
    let pipeline = fx.pipeline(&[("acme", tenant_dsn)]).await;

    let file = fx.write("users.csv", "id,email,name\n1,a@x.com,A\n2,b@x.com,B\n3,,C\n");
    let id = fx.store.enqueue("acme", "users", &file).await.unwrap();
    let job = fx.claim().await;
    pipeline.process_job(&job, &Default::default()).await.unwrap();

    let job = fx.store.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error_text.as_deref(),
        Some("record 2 missing required field email")
    );

    let tenant = fx.pg.connect_to("tenant_acme").await.unwrap();
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&tenant)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unknown_tenant_fails_job() {
    let fx = Fixture::start().await;
    let pipeline = fx.pipeline(&[]).await;

    let file = fx.write("orgs.csv", "id,name\n1,Acme\n");
    let id = fx.store.enqueue("globex", "organizations", &file).await.unwrap();
    let job = fx.claim().await;
    pipeline.process_job(&job, &Default::default()).await.unwrap();

    let job = fx.store.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_text.unwrap().contains("unknown tenant 'globex'"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_worker_pool_imports_two_tenants() {
    let fx = Fixture::start().await;
    let acme = fx.pg.create_database("tenant_acme").await.unwrap();
    let globex = fx.pg.create_database("tenant_globex").await.unwrap();
    let pipeline = fx.pipeline(&[("acme", acme), ("globex", globex)]).await;

    let courses = fx.write("courses.tsv", "id\ttitle\n1\tRust\n2\tSQL\n");
    let settings = fx.write("org.conf", "# orgs\nid=1\nname=Globex\n");

    let first = fx.store.enqueue("acme", "courses", &courses).await.unwrap();
    // key=value records have no "id"/"name" columns, so this one fails validation
    let second = fx.store.enqueue("globex", "organizations", &settings).await.unwrap();

    let handle = WorkerPool::new(
        fx.store.clone(),
        Arc::new(pipeline),
        WorkerPoolConfig::default()
            .with_concurrency(2)
            .with_idle_delay(Duration::from_millis(100)),
    )
    .start();

    let first = wait_until_terminal(&fx.store, first).await;
    let second = wait_until_terminal(&fx.store, second).await;
    let report = handle.shutdown(Duration::from_secs(5)).await;

    assert_eq!(first.status, JobStatus::Succeeded);
    assert_eq!(second.status, JobStatus::Failed);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);

    let tenant = fx.pg.connect_to("tenant_acme").await.unwrap();
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses")
        .fetch_one(&tenant)
        .await
        .unwrap();
    assert_eq!(count, 2);
}
