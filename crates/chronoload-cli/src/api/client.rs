//! Query dispatcher
//!
//! Submits a query to the remote API and returns the manifest of result chunks.
//! There is no retry here: a failed submission propagates straight to the caller.

use crate::api::{endpoints, types::*};
use crate::error::{PipelineError, Result};
use reqwest::Client;
use tracing::{info, instrument, warn};

/// Client for the query API
#[derive(Clone)]
pub struct QueryClient {
    client: Client,
    base_url: String,
}

impl QueryClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Submit a query and parse the chunk manifest.
    ///
    /// Fails with a network-class error on transport failure or non-2xx
    /// status, and with [`PipelineError::Protocol`] when the envelope is
    /// malformed.
    #[instrument(skip(self, request), fields(row_limit = request.row_limit))]
    pub async fn submit_query(&self, request: &QueryRequest) -> Result<QueryEnvelope> {
        let url = endpoints::query_url(&self.base_url);

        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::http_status(url, status));
        }

        let text = response.text().await?;
        let envelope = QueryEnvelope::from_response_text(&text)?;

        if envelope.metadata.chunk_count != envelope.chunks.len() as u64 {
            warn!(
                declared = envelope.metadata.chunk_count,
                listed = envelope.chunks.len(),
                "Chunk count in metadata disagrees with chunk list"
            );
        }

        info!(
            transfer_id = envelope.transfer_id.as_deref().unwrap_or("-"),
            chunks = envelope.chunks.len(),
            partitions = envelope.metadata.total_partitions,
            estimated_size = envelope.metadata.estimated_size,
            "Query dispatched"
        );

        Ok(envelope)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
