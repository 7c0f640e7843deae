//! API clients
//!
//! HTTP clients for the query API (chunk manifests) and the bulk-download API
//! (pre-built archives).

pub mod archives;
pub mod client;
pub mod endpoints;
pub mod types;

pub use archives::ArchiveClient;
pub use client::QueryClient;
pub use types::*;

use crate::error::Result;
use std::time::Duration;

/// Build the shared HTTP client.
///
/// `timeout` bounds connecting and each read, not the whole transfer, so a
/// multi-gigabyte archive can stream for as long as it keeps making progress.
/// No cookie store is configured, so chunk and archive requests never carry
/// ambient credentials.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .user_agent(concat!("chronoload/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
