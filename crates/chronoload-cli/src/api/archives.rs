//! Bulk-download API client
//!
//! Lists pre-built archives and opens (optionally ranged) download streams.

use crate::api::{endpoints, types::ArchiveInfo};
use crate::error::{PipelineError, Result};
use chronoload_common::types::range_from;
use reqwest::header::RANGE;
use reqwest::Client;

/// Client for `/bulk-download/archives`
#[derive(Clone)]
pub struct ArchiveClient {
    client: Client,
    base_url: String,
}

impl ArchiveClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// List the archives available for download
    pub async fn list_archives(&self) -> Result<Vec<ArchiveInfo>> {
        let url = endpoints::archives_url(&self.base_url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::http_status(url, status));
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| PipelineError::protocol(format!("invalid archive listing: {}", e)))
    }

    /// Look up one archive by name
    pub async fn find_archive(&self, name: &str) -> Result<Option<ArchiveInfo>> {
        let archives = self.list_archives().await?;
        Ok(archives.into_iter().find(|a| a.name == name))
    }

    /// Build the download request for `name`, ranged from `offset` when non-zero.
    ///
    /// The request is returned unsent so the caller can race it against its
    /// cancellation token.
    pub fn download_request(
        &self,
        name: &str,
        offset: u64,
        start: Option<&str>,
        end: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let url = endpoints::archive_download_url(&self.base_url, name, start, end);
        let request = self.client.get(url);

        if offset > 0 {
            request.header(RANGE, range_from(offset))
        } else {
            request
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
