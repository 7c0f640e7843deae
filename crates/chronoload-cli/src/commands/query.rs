//! `chronoload query` command implementation
//!
//! Runs a query end to end and loads its result chunks into the local database.

use crate::config::Config;
use crate::error::Result;
use crate::ingest::IngestionSink;
use crate::pipeline::{run_query, QueryRunSummary};
use crate::progress;
use colored::Colorize;
use std::path::PathBuf;

/// Command-line overrides for a query run
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub row_limit: Option<u64>,
    pub concurrency: Option<usize>,
    pub database: Option<PathBuf>,
}

impl QueryOptions {
    pub fn apply(&self, config: &mut Config) {
        if let Some(limit) = self.row_limit {
            config.row_limit = limit;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
    }
}

/// Run the query command
pub async fn run(mut config: Config, query: String, options: QueryOptions) -> Result<()> {
    options.apply(&mut config);
    config.validate()?;

    println!("{} Submitting query...", "→".cyan());

    let mut sink = IngestionSink::new(&config.database);
    let pb = progress::create_chunk_progress(0, "Fetching chunks");

    let summary = match run_query(&mut config, &query, &mut sink, Some(pb.clone())).await {
        Ok(summary) => summary,
        Err(e) => {
            pb.abandon();
            return Err(e);
        },
    };
    pb.finish_and_clear();

    let total_rows = sink.canonical_row_count()?;
    sink.close()?;

    print_summary(&summary, total_rows, &config);
    Ok(())
}

fn print_summary(summary: &QueryRunSummary, total_rows: u64, config: &Config) {
    let report = &summary.report;

    if summary.chunk_count == 0 {
        println!("{} Query returned no chunks", "✓".green());
        return;
    }

    println!(
        "{} {}/{} chunk(s) loaded, {} row(s) appended in {:.1}s",
        "✓".green(),
        report.ingested_chunks(),
        summary.chunk_count,
        report.ingested_rows,
        summary.elapsed.as_secs_f64()
    );

    if summary.is_partial() {
        println!(
            "{} Partial result: {} chunk(s) failed to download, {} could not be ingested",
            "!".yellow().bold(),
            report.failed.len(),
            report.skipped.len()
        );
        for failed in &report.failed {
            println!(
                "  {} {} ({} attempts): {}",
                "✗".red(),
                failed.url,
                failed.attempts,
                failed.reason
            );
        }
        for skipped in &report.skipped {
            println!("  {} {}: {}", "✗".red(), skipped.url, skipped.reason);
        }
    }

    println!(
        "Database: {} ({} row(s) total)",
        config.database.display(),
        total_rows
    );
}
