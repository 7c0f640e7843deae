//! Batch downloader
//!
//! Downloads a chunk list in consecutive batches. Every download in a batch
//! runs concurrently; the batch is fully resolved, and every success handed to
//! the sink, before the next one starts. That barrier is what keeps two chunks
//! from using the sink's staging table at once.

use super::retry::{next_batch_size, RetryPolicy};
use crate::api::ChunkRef;
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::ingest::ChunkSink;
use bytes::Bytes;
use futures::future::join_all;
use indicatif::ProgressBar;
use reqwest::header::ACCEPT;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Result of downloading one chunk URL, after retries
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub url: String,
    pub payload: Option<Bytes>,
    pub attempts: u32,
    /// Last error seen when every attempt failed
    pub error: Option<String>,
}

impl DownloadOutcome {
    pub fn success(&self) -> bool {
        self.payload.is_some()
    }
}

/// A chunk whose retries were exhausted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedChunk {
    pub url: String,
    pub attempts: u32,
    pub reason: String,
}

/// A chunk that downloaded but could not be ingested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedChunk {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    /// Successfully downloaded payloads, in completion order per batch
    pub payloads: Vec<Bytes>,
    pub failed: Vec<FailedChunk>,
    pub skipped: Vec<SkippedChunk>,
    pub ingested_rows: u64,
    /// Batch size used for each batch, in order
    pub batch_sizes: Vec<usize>,
}

impl DownloadReport {
    pub fn attempted(&self) -> usize {
        self.payloads.len() + self.failed.len()
    }

    pub fn downloaded(&self) -> usize {
        self.payloads.len()
    }

    pub fn ingested_chunks(&self) -> usize {
        self.payloads.len().saturating_sub(self.skipped.len())
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

pub struct BatchDownloader {
    client: Client,
    retry: RetryPolicy,
    batch_pause: Duration,
    initial_batch_size: usize,
    progress: Option<ProgressBar>,
}

impl BatchDownloader {
    pub fn new(client: Client, initial_batch_size: usize) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            batch_pause: Duration::from_millis(crate::config::DEFAULT_BATCH_PAUSE_MS),
            initial_batch_size: initial_batch_size.max(1),
            progress: None,
        }
    }

    pub fn from_config(client: Client, config: &Config) -> Self {
        Self::new(client, config.concurrency)
            .with_retry(RetryPolicy::from_config(config))
            .with_batch_pause(config.batch_pause())
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_pause(mut self, pause: Duration) -> Self {
        self.batch_pause = pause;
        self
    }

    /// Advance `progress` by one for every resolved chunk
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Download every chunk and feed successes to `sink`.
    ///
    /// Individual chunk failures are recorded in the report, not returned.
    /// Only a sink that cannot be prepared (or loses its connection) fails
    /// the call.
    #[instrument(skip_all, fields(chunks = chunks.len(), initial_batch_size = self.initial_batch_size))]
    pub async fn download_all<S: ChunkSink>(
        &self,
        chunks: &[ChunkRef],
        sink: &mut S,
    ) -> Result<DownloadReport> {
        sink.prepare()?;

        let mut report = DownloadReport::default();
        let mut batch_size = self.initial_batch_size;
        let mut remaining = chunks;

        while !remaining.is_empty() {
            let (batch, rest) = remaining.split_at(batch_size.min(remaining.len()));
            remaining = rest;
            report.batch_sizes.push(batch_size);

            let outcomes = join_all(batch.iter().map(|chunk| self.download_one(&chunk.url))).await;

            let mut batch_ok = 0;
            for outcome in outcomes {
                if let Some(pb) = &self.progress {
                    pb.inc(1);
                }

                let Some(payload) = outcome.payload else {
                    let reason = outcome.error.unwrap_or_else(|| "unknown error".to_string());
                    warn!(url = %outcome.url, attempts = outcome.attempts, %reason, "Chunk dropped after retries");
                    report.failed.push(FailedChunk {
                        url: outcome.url,
                        attempts: outcome.attempts,
                        reason,
                    });
                    continue;
                };

                batch_ok += 1;
                match sink.ingest(&outcome.url, &payload) {
                    Ok(rows) => {
                        debug!(url = %outcome.url, rows, "Chunk ingested");
                        report.ingested_rows += rows;
                    },
                    Err(e @ PipelineError::Connection { .. }) => return Err(e),
                    Err(e) => {
                        warn!(url = %outcome.url, error = %e, "Chunk skipped");
                        report.skipped.push(SkippedChunk {
                            url: outcome.url,
                            reason: e.to_string(),
                        });
                    },
                }
                report.payloads.push(payload);
            }

            info!(
                batch = report.batch_sizes.len(),
                size = batch.len(),
                succeeded = batch_ok,
                remaining = remaining.len(),
                "Batch resolved"
            );

            let next = next_batch_size(batch_size, report.downloaded(), report.attempted());
            if next < batch_size {
                warn!(
                    from = batch_size,
                    to = next,
                    succeeded = report.downloaded(),
                    attempted = report.attempted(),
                    "Success rate below threshold, shrinking batch size"
                );
            }
            batch_size = next;

            if !remaining.is_empty() && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }
        }

        Ok(report)
    }

    /// Download one URL with bounded retry
    pub async fn download_one(&self, url: &str) -> DownloadOutcome {
        let mut last_error = None;

        for attempt in 1..=self.retry.max_attempts {
            if let Some(delay) = self.retry.delay_before(attempt) {
                debug!(url, attempt, delay_ms = delay.as_millis() as u64, "Backing off");
                tokio::time::sleep(delay).await;
            }

            match self.fetch(url).await {
                Ok(payload) => {
                    return DownloadOutcome {
                        url: url.to_string(),
                        payload: Some(payload),
                        attempts: attempt,
                        error: None,
                    }
                },
                Err(e) => {
                    warn!(url, attempt, max_attempts = self.retry.max_attempts, error = %e, "Chunk download attempt failed");
                    last_error = Some(e.to_string());
                },
            }
        }

        DownloadOutcome {
            url: url.to_string(),
            payload: None,
            attempts: self.retry.max_attempts,
            error: last_error,
        }
    }

    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let response = self.client.get(url).header(ACCEPT, "*/*").send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::http_status(url, status));
        }

        Ok(response.bytes().await?)
    }
}
