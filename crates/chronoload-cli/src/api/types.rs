//! API request and response types
//!
//! Matches the query API and bulk-download API wire formats.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Query submission payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    pub client_id: String,
    pub row_limit: u64,
}

/// Outer response wrapper; `body` holds the envelope, usually as a JSON string
#[derive(Debug, Clone, Deserialize)]
struct ResponseWrapper {
    body: serde_json::Value,
}

/// Parsed query response: where the result chunks live
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryEnvelope {
    #[serde(default, alias = "transferId")]
    pub transfer_id: Option<String>,

    pub metadata: QueryMetadata,

    pub chunks: Vec<ChunkRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryMetadata {
    pub total_partitions: u64,

    /// Estimated result size in bytes
    pub estimated_size: u64,

    pub chunk_count: u64,
}

/// One retrievable unit of a query result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChunkRef {
    pub url: String,
}

impl ChunkRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// An entry of the archive listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub checksum: Option<String>,
}

impl QueryEnvelope {
    /// Parse the raw response text of a query submission.
    ///
    /// The `body` field may carry the envelope either as a JSON-encoded string
    /// or as an inline object; both are accepted.
    pub fn from_response_text(text: &str) -> Result<Self> {
        let wrapper: ResponseWrapper = serde_json::from_str(text)
            .map_err(|e| PipelineError::protocol(format!("response is not a JSON envelope: {}", e)))?;

        let envelope: QueryEnvelope = match wrapper.body {
            serde_json::Value::String(inner) => serde_json::from_str(&inner)
                .map_err(|e| PipelineError::protocol(format!("invalid body: {}", e)))?,
            value @ serde_json::Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| PipelineError::protocol(format!("invalid body: {}", e)))?,
            other => {
                return Err(PipelineError::protocol(format!(
                    "body must be a JSON object or string, got {}",
                    other
                )))
            },
        };

        Ok(envelope)
    }
}
