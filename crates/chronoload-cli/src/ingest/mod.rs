//! Ingestion of downloaded chunks into the embedded analytical database
//!
//! Each chunk is an Arrow IPC payload. It is loaded into a single staging
//! table, cast column by column into the canonical schema with one
//! `INSERT ... SELECT`, and the staging table is dropped again whatever the
//! outcome. The canonical table only ever grows.

pub mod payload;
pub mod schema;
pub mod sink;

pub use schema::{CANONICAL_COLUMNS, CANONICAL_TABLE, STAGING_TABLE};
pub use sink::IngestionSink;

use crate::error::Result;

/// Destination for downloaded chunk payloads.
///
/// The batch downloader is generic over this so the barrier and retry logic
/// can be exercised without an engine.
pub trait ChunkSink {
    /// Establish the engine connection and canonical schema.
    ///
    /// Called once before any download starts; an error here aborts the run.
    fn prepare(&mut self) -> Result<()>;

    /// Append one chunk, returning the number of rows added.
    ///
    /// An error leaves the canonical table untouched for this chunk.
    fn ingest(&mut self, chunk: &str, payload: &[u8]) -> Result<u64>;
}
