//! `chronoload status` command implementation
//!
//! Shows what the local analytical database holds.

use crate::config::Config;
use crate::error::Result;
use crate::ingest::{IngestionSink, CANONICAL_TABLE};
use crate::progress::format_bytes;
use colored::Colorize;
use std::path::PathBuf;

/// Show status of the local database
pub async fn run(config: Config, database: Option<PathBuf>) -> Result<()> {
    let path = database.unwrap_or(config.database);

    if path.as_os_str() != crate::config::IN_MEMORY_DATABASE && !path.exists() {
        println!("No database found at {}", path.display());
        println!("Run 'chronoload query' to load data.");
        return Ok(());
    }

    let mut sink = IngestionSink::open(&path)?;
    let rows = sink.canonical_row_count()?;
    sink.close()?;

    println!("{}", "Database:".cyan().bold());
    println!("  Path:  {}", path.display());
    if let Ok(meta) = std::fs::metadata(&path) {
        println!("  Size:  {}", format_bytes(meta.len()));
    }
    println!("  Table: {}", CANONICAL_TABLE);
    println!("  Rows:  {}", rows);

    Ok(())
}
