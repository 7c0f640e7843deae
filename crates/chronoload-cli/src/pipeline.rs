//! Query pipeline: dispatch, download, ingest

use crate::api::{build_http_client, QueryClient, QueryRequest};
use crate::config::Config;
use crate::download::{BatchDownloader, DownloadReport};
use crate::error::{PipelineError, Result};
use crate::ingest::ChunkSink;
use indicatif::ProgressBar;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

/// Outcome of one query run
#[derive(Debug, Clone)]
pub struct QueryRunSummary {
    pub transfer_id: Option<String>,
    /// Chunks listed by the query response
    pub chunk_count: usize,
    pub report: DownloadReport,
    pub elapsed: Duration,
}

impl QueryRunSummary {
    pub fn is_partial(&self) -> bool {
        !self.report.is_complete()
    }
}

/// Submit `query`, download every chunk it names and ingest them into `sink`.
///
/// Dispatch failures propagate unchanged. Individual chunk failures are
/// reported in the summary; the run fails only when chunks were listed and
/// none of them made it into the sink.
#[instrument(skip(config, sink, progress), fields(api_url = %config.api_url))]
pub async fn run_query<S: ChunkSink>(
    config: &mut Config,
    query: &str,
    sink: &mut S,
    progress: Option<ProgressBar>,
) -> Result<QueryRunSummary> {
    let started = Instant::now();
    let http = build_http_client(config.timeout())?;

    let request = QueryRequest {
        query: query.to_string(),
        client_id: config.client_id(),
        row_limit: config.row_limit,
    };
    let envelope = QueryClient::new(http.clone(), config.api_url.as_str())
        .submit_query(&request)
        .await?;

    let mut downloader = BatchDownloader::from_config(http, config);
    if let Some(pb) = progress {
        pb.set_length(envelope.chunks.len() as u64);
        downloader = downloader.with_progress(pb);
    }

    let report = downloader.download_all(&envelope.chunks, sink).await?;

    if report.attempted() > 0 && report.downloaded() == 0 {
        return Err(PipelineError::NoChunksSucceeded {
            attempted: report.attempted(),
        });
    }
    if report.attempted() > 0 && report.ingested_chunks() == 0 {
        let reason = report
            .skipped
            .first()
            .map(|s| s.reason.clone())
            .unwrap_or_else(|| "unknown".to_string());
        return Err(PipelineError::NoChunksIngested {
            downloaded: report.downloaded(),
            reason,
        });
    }

    let summary = QueryRunSummary {
        transfer_id: envelope.transfer_id,
        chunk_count: envelope.chunks.len(),
        report,
        elapsed: started.elapsed(),
    };

    info!(
        chunks = summary.chunk_count,
        downloaded = summary.report.downloaded(),
        failed = summary.report.failed.len(),
        skipped = summary.report.skipped.len(),
        rows = summary.report.ingested_rows,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Query run finished"
    );

    Ok(summary)
}
