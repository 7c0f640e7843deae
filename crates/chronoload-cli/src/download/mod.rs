//! Chunk downloading with per-URL retry and adaptive batch sizing

pub mod batch;
pub mod retry;

pub use batch::{BatchDownloader, DownloadOutcome, DownloadReport, FailedChunk, SkippedChunk};
pub use retry::{next_batch_size, RetryPolicy};
