//! Ferry CLI Library
//!
//! Command-line front door for the import queue:
//!
//! - **Enqueue**: submit a file for a tenant (`ferry enqueue`)
//! - **Work**: run the worker pool in the foreground (`ferry work`)
//! - **Status**: show a job and its log trail (`ferry status`)
//! - **Parse**: dry-run a local file through the parser and validator,
//!   no database needed (`ferry parse`)

pub mod commands;
pub mod error;

pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ferry - multi-tenant file import queue
#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enqueue an import job
    Enqueue {
        /// Tenant id, as listed in the tenant map
        #[arg(long, visible_alias = "customer")]
        tenant: String,

        /// Product type (users, organizations, courses)
        #[arg(long)]
        product: String,

        /// File path, file:// URI or s3://bucket/key
        #[arg(long)]
        file: String,

        /// Keep running workers in the foreground after enqueueing
        #[arg(long)]
        work: bool,
    },

    /// Run the worker pool until interrupted
    Work {
        /// Number of concurrent jobs (defaults to WORKER_CONCURRENCY)
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// Show a job and its log trail
    Status {
        /// Job id
        job_id: i64,
    },

    /// Parse and validate a local file without touching any database
    Parse {
        /// File to parse; the extension selects the format
        file: PathBuf,

        /// Validate records against this product type
        #[arg(short, long)]
        product: Option<String>,

        /// Records per batch (0 means the default)
        #[arg(short, long, default_value_t = 0)]
        batch_size: usize,

        /// Print every record as a JSON line
        #[arg(long)]
        print: bool,
    },
}
