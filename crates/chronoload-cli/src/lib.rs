//! Chronoload CLI Library
//!
//! Client-side pipeline that pulls time-series usage data from a remote query
//! API into a local DuckDB database, plus resumable downloads of pre-built
//! archives.
//!
//! # Overview
//!
//! - **Query runs**: dispatch a query, download its result chunks in adaptive
//!   batches and append them to the canonical table (`chronoload query`)
//! - **Archives**: list and download pre-built archives with progress and
//!   abort (`chronoload archives list/download`)
//! - **Status**: inspect the local database (`chronoload status`)

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod archive;
pub mod commands;
pub mod config;
pub mod download;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod progress;

// Re-export commonly used types
pub use config::Config;
pub use error::{PipelineError, Result};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Chronoload - load remote time-series usage data into a local analytical database
#[derive(Parser, Debug)]
#[command(name = "chronoload")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to ./chronoload.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Query API URL
    #[arg(long, env = "CHRONOLOAD_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Bulk-download API URL
    #[arg(long, env = "CHRONOLOAD_ARCHIVE_URL", global = true)]
    pub archive_url: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a query and load its results into the local database
    Query {
        /// Query expression sent to the API
        query: String,

        /// Maximum number of rows the API should return
        #[arg(long)]
        row_limit: Option<u64>,

        /// Initial number of concurrent chunk downloads
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Database file (or :memory:)
        #[arg(long)]
        database: Option<PathBuf>,
    },

    /// Pre-built archive downloads
    Archives {
        #[command(subcommand)]
        command: ArchivesCommand,
    },

    /// Show the local database status
    Status {
        /// Database file
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

/// Archive subcommands
#[derive(Subcommand, Debug)]
pub enum ArchivesCommand {
    /// List available archives
    List,

    /// Download an archive
    Download {
        /// Archive name
        name: String,

        /// Start of the time window
        #[arg(long)]
        start: Option<String>,

        /// End of the time window
        #[arg(long)]
        end: Option<String>,

        /// Output path (defaults to the download directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Effective configuration: file and environment, then global flags
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::resolve(self.config.as_deref())?;
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(url) = &self.archive_url {
            config.archive_url = url.clone();
        }
        config.validate()?;
        Ok(config)
    }
}
