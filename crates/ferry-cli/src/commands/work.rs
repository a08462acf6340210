//! `ferry work` command implementation
//!
//! Runs the worker pool in the foreground until Ctrl+C or SIGTERM, then
//! drains in-flight jobs for up to `SHUTDOWN_TIMEOUT_SECS`.

use ferry_server::app::{shutdown_signal, Services};
use ferry_server::config::Config;

use super::load_config;
use crate::error::{CliError, Result};

pub async fn run(concurrency: Option<usize>) -> Result<()> {
    run_with(load_config()?, concurrency).await
}

pub(crate) async fn run_with(mut config: Config, concurrency: Option<usize>) -> Result<()> {
    if let Some(concurrency) = concurrency {
        config.worker.concurrency = concurrency;
        config.validate().map_err(CliError::config)?;
    }

    let services = Services::build(&config).await.map_err(CliError::config)?;
    let handle = services.worker_pool(&config).start();
    println!(
        "Running {} workers, press Ctrl+C to stop",
        config.worker.concurrency
    );

    shutdown_signal().await;
    let report = handle.shutdown(config.shutdown_timeout()).await;
    services.pool.close().await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
