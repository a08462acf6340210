//! `ferry status` command implementation

use ferry_server::{db, jobs::JobStore, jobs::PgJobStore};

use super::load_config;
use crate::error::{CliError, Result};

/// Print a job and its log trail.
pub async fn run(job_id: i64) -> Result<()> {
    let config = load_config()?;
    let pool = db::create_pool(&config.db_config()).await?;
    let store = PgJobStore::new(pool.clone());

    let job = store.get(job_id).await?.ok_or(CliError::JobNotFound(job_id))?;
    let logs = store.logs(job_id).await?;
    pool.close().await;

    println!("Job {}", job.id);
    println!("  Tenant:   {}", job.tenant_id);
    println!("  Product:  {}", job.product_type);
    println!("  Blob:     {}", job.blob_uri);
    println!("  Status:   {}", job.status);
    println!("  Created:  {}", job.created_at);
    if let Some(started) = job.started_at {
        println!("  Started:  {started}");
    }
    if let Some(finished) = job.finished_at {
        println!("  Finished: {finished}");
    }
    if let Some(error) = &job.error_text {
        println!("  Error:    {error}");
    }

    if !logs.is_empty() {
        println!();
        println!("Log:");
        for entry in &logs {
            let context = entry
                .context
                .as_ref()
                .map(|c| format!(" {c}"))
                .unwrap_or_default();
            println!(
                "  {} {:<5} {}{}",
                entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                entry.level.as_str(),
                entry.message,
                context
            );
        }
    }

    Ok(())
}
