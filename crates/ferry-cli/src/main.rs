//! Ferry CLI - Main entry point

use clap::Parser;
use ferry_cli::{commands, Cli, Commands};
use ferry_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("ferry-cli")
        .build();

    // environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // the CLI works without logging
    let _guard = init_logging(&log_config).ok();

    if let Err(e) = execute_command(cli.command).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn execute_command(command: Commands) -> ferry_cli::Result<()> {
    match command {
        Commands::Enqueue {
            tenant,
            product,
            file,
            work,
        } => commands::enqueue::run(&tenant, &product, &file, work).await,
        Commands::Work { concurrency } => commands::work::run(concurrency).await,
        Commands::Status { job_id } => commands::status::run(job_id).await,
        Commands::Parse {
            file,
            product,
            batch_size,
            print,
        } => commands::parse::run(&file, product.as_deref(), batch_size, print).await,
    }
}
