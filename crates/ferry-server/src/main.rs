//! Ferry Server - REST front door plus the worker pool

use anyhow::Result;
use ferry_common::logging::{init_logging, LogConfig};
use std::net::SocketAddr;
use tracing::info;

use ferry_server::{
    api::{self, ApiState},
    app::{shutdown_signal, Services},
    config::Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("ferry-server")
        .filter_directives("ferry_server=debug,tower_http=debug,sqlx=warn")
        .build();

    // environment takes precedence over the built-in defaults
    let log_config = log_config.merge_env()?;
    let _guard = init_logging(&log_config)?;

    info!("Starting Ferry Server");

    let config = Config::load()?;
    info!(
        rest_addr = %config.server.rest_addr,
        concurrency = config.worker.concurrency,
        "Configuration loaded"
    );

    let services = Services::build(&config).await?;
    let workers = services.worker_pool(&config).start();

    let state = ApiState::new(services.store.clone()).with_db(services.pool.clone());
    let app = api::create_router(state);

    let addr: SocketAddr = config.server.rest_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    let stop_claiming = workers.shutdown_token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            stop_claiming.cancel();
        })
        .await?;

    let report = workers.shutdown(config.shutdown_timeout()).await;
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        aborted = report.aborted,
        "Worker pool drained"
    );

    services.pool.close().await;
    info!("Server shut down gracefully");

    Ok(())
}
