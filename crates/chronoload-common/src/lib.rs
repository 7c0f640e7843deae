//! Chronoload Common Library
//!
//! Shared utilities and error handling for the chronoload workspace.
//!
//! - **Logging**: tracing subscriber setup shared by every binary
//! - **Checksums**: SHA-256 verification of assembled downloads
//! - **Types**: HTTP range types used by resumable transfers
//!
//! # Example
//!
//! ```no_run
//! use chronoload_common::checksum;
//! use chronoload_common::types::ContentRange;
//!
//! fn check(body: &[u8], header: &str) -> chronoload_common::Result<u64> {
//!     checksum::verify_sha256(body, "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")?;
//!     let range: ContentRange = header.parse()?;
//!     Ok(range.total.unwrap_or(0))
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
