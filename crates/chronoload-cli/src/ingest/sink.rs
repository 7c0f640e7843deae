//! DuckDB-backed ingestion sink

use super::payload::DecodedPayload;
use super::schema::{
    casted_insert_sql, create_canonical_sql, create_staging_sql, drop_staging_sql,
    CANONICAL_TABLE, STAGING_TABLE,
};
use super::ChunkSink;
use crate::config::IN_MEMORY_DATABASE;
use crate::error::{PipelineError, Result};
use duckdb::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Rows per appended record batch; one engine vector
const APPEND_ROWS: usize = 2048;

/// Appends chunk payloads into the canonical table.
///
/// The connection is opened lazily on first use and reused afterwards. Chunks
/// are ingested one at a time through the single staging table; `&mut self`
/// keeps two chunks from sharing it.
pub struct IngestionSink {
    path: PathBuf,
    conn: Option<Connection>,
    chunks_ingested: u64,
}

impl IngestionSink {
    /// Create a sink for `path` (or `:memory:`) without opening it yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
            chunks_ingested: 0,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY_DATABASE)
    }

    /// Open the database and make sure the canonical table exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut sink = Self::new(path);
        sink.connection()?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chunks_ingested(&self) -> u64 {
        self.chunks_ingested
    }

    fn connection(&mut self) -> Result<&Connection> {
        if self.conn.is_none() {
            let conn = open_connection(&self.path)?;
            conn.execute_batch(&create_canonical_sql())
                .map_err(|e| PipelineError::connection(self.path.display().to_string(), e))?;
            info!(database = %self.path.display(), "Analytical database ready");
            self.conn = Some(conn);
        }

        match self.conn.as_ref() {
            Some(conn) => Ok(conn),
            None => Err(PipelineError::connection(
                self.path.display().to_string(),
                "connection unavailable",
            )),
        }
    }

    /// Append one chunk to the canonical table.
    ///
    /// All rows land or none do. The staging table is dropped afterwards
    /// regardless of the outcome.
    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    pub fn ingest_chunk(&mut self, chunk: &str, payload: &[u8]) -> Result<u64> {
        let decoded =
            DecodedPayload::decode(payload).map_err(|e| PipelineError::ingestion(chunk, e))?;

        let conn = self.connection()?;
        let loaded = load_into_canonical(conn, &decoded);
        let dropped = conn.execute_batch(&drop_staging_sql());
        let rows = settle(chunk, loaded, dropped)?;

        self.chunks_ingested += 1;
        debug!(rows, "Chunk appended to {}", CANONICAL_TABLE);
        Ok(rows)
    }

    /// Rows currently in the canonical table
    pub fn canonical_row_count(&mut self) -> Result<u64> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", CANONICAL_TABLE),
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Whether a staging table is currently present
    pub fn staging_exists(&mut self) -> Result<bool> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            duckdb::params![STAGING_TABLE],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Close the connection, flushing it to disk
    pub fn close(mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| PipelineError::Database(e))?;
        }
        Ok(())
    }
}

impl ChunkSink for IngestionSink {
    fn prepare(&mut self) -> Result<()> {
        self.connection().map(|_| ())
    }

    fn ingest(&mut self, chunk: &str, payload: &[u8]) -> Result<u64> {
        self.ingest_chunk(chunk, payload)
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let display = path.display().to_string();

    if path.as_os_str() == IN_MEMORY_DATABASE {
        return Connection::open_in_memory().map_err(|e| PipelineError::connection(display, e));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::connection(&display, e))?;
    }

    Connection::open(path).map_err(|e| PipelineError::connection(display, e))
}

/// Combine the load result with the staging cleanup.
///
/// Once the casted insert has committed the rows are in the canonical table,
/// so a failed drop is only logged; the next chunk drops staging again first.
fn settle(
    chunk: &str,
    loaded: std::result::Result<u64, String>,
    dropped: duckdb::Result<()>,
) -> Result<u64> {
    let rows = loaded.map_err(|message| PipelineError::ingestion(chunk, message))?;
    if let Err(e) = dropped {
        warn!(chunk, error = %e, "Failed to drop staging table after insert");
    }
    Ok(rows)
}

/// Stage the decoded chunk and cast it into the canonical table.
///
/// Errors are returned as messages; the caller attaches the chunk label.
fn load_into_canonical(
    conn: &Connection,
    decoded: &DecodedPayload,
) -> std::result::Result<u64, String> {
    let ddl = create_staging_sql(&decoded.schema)?;
    conn.execute_batch(&format!("{}; {}", drop_staging_sql(), ddl))
        .map_err(|e| e.to_string())?;

    {
        let mut appender = conn.appender(STAGING_TABLE).map_err(|e| e.to_string())?;
        for batch in &decoded.batches {
            let mut offset = 0;
            while offset < batch.num_rows() {
                let len = APPEND_ROWS.min(batch.num_rows() - offset);
                appender
                    .append_record_batch(batch.slice(offset, len))
                    .map_err(|e| e.to_string())?;
                offset += len;
            }
        }
        appender.flush().map_err(|e| e.to_string())?;
    }

    let inserted = conn
        .execute(&casted_insert_sql(), [])
        .map_err(|e| e.to_string())?;
    Ok(inserted as u64)
}
