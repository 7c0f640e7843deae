//! In-process store for assembled archives
//!
//! Finished downloads are held in memory under an opaque `blob:` URL until
//! the caller saves them to disk or revokes them.

use crate::error::{PipelineError, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub const BLOB_URL_PREFIX: &str = "blob:chronoload/";

#[derive(Clone, Default)]
pub struct BlobStore {
    blobs: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` and return the URL that resolves to it
    pub async fn insert(&self, data: Bytes) -> String {
        let url = format!("{}{}", BLOB_URL_PREFIX, uuid::Uuid::new_v4());
        self.blobs.lock().await.insert(url.clone(), data);
        url
    }

    pub async fn get(&self, url: &str) -> Option<Bytes> {
        self.blobs.lock().await.get(url).cloned()
    }

    /// Write the blob behind `url` to `path`, returning the bytes written.
    ///
    /// The blob stays available until revoked.
    pub async fn save(&self, url: &str, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        let data = self
            .get(url)
            .await
            .ok_or_else(|| PipelineError::protocol(format!("unknown blob URL '{}'", url)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &data).await?;

        debug!(url, path = %path.display(), bytes = data.len(), "Blob saved");
        Ok(data.len() as u64)
    }

    /// Release the blob; returns whether it existed
    pub async fn revoke(&self, url: &str) -> bool {
        self.blobs.lock().await.remove(url).is_some()
    }

    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
