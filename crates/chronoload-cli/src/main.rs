//! Chronoload CLI - Main entry point

use chronoload_cli::{ArchivesCommand, Cli, Commands};
use chronoload_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use clap::Parser;
use std::process;
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        })
        .output(LogOutput::Console)
        .log_file_prefix("chronoload")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().with_env().unwrap_or(log_config);

    // The CLI works without logging
    let _guard = init_logging(&log_config).ok();

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn execute_command(cli: &Cli) -> chronoload_cli::Result<()> {
    let config = cli.resolve_config()?;

    match &cli.command {
        Commands::Query {
            query,
            row_limit,
            concurrency,
            database,
        } => {
            let options = chronoload_cli::commands::query::QueryOptions {
                row_limit: *row_limit,
                concurrency: *concurrency,
                database: database.clone(),
            };
            chronoload_cli::commands::query::run(config, query.clone(), options).await
        },
        Commands::Archives { command } => match command {
            ArchivesCommand::List => chronoload_cli::commands::archives::list(config).await,
            ArchivesCommand::Download {
                name,
                start,
                end,
                output,
            } => {
                chronoload_cli::commands::archives::download(
                    config,
                    name.clone(),
                    start.clone(),
                    end.clone(),
                    output.clone(),
                )
                .await
            },
        },
        Commands::Status { database } => {
            chronoload_cli::commands::status::run(config, database.clone()).await
        },
    }
}
