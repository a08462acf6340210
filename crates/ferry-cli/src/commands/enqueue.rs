//! `ferry enqueue` command implementation

use ferry_server::{db, jobs::JobStore, jobs::PgJobStore};
use tracing::info;

use super::load_config;
use crate::error::Result;

pub async fn run(tenant: &str, product: &str, file: &str, work: bool) -> Result<()> {
    let config = load_config()?;

    let job_id = {
        let pool = db::create_pool(&config.db_config()).await?;
        db::run_migrations(&pool).await?;

        let store = PgJobStore::new(pool.clone());
        let job_id = store.enqueue(tenant, product, file).await?;
        pool.close().await;
        job_id
    };

    info!(job_id, tenant, product, "Job enqueued");
    println!("Enqueued job {job_id}");

    if work {
        super::work::run_with(config, None).await?;
    }

    Ok(())
}
