//! Resumable archive downloads
//!
//! A background worker receives [`WorkerCommand`]s and reports through
//! [`WorkerEvent`]s. Each archive name gets its own fetch task; distinct
//! archives download concurrently, and a given name has at most one live
//! fetch at a time.

pub mod blob;
pub mod messages;
pub mod state;
pub mod worker;

pub use blob::BlobStore;
pub use messages::{ArchiveRef, WorkerCommand, WorkerEvent};
pub use state::{ArchiveDownloadState, ArchiveStates};
pub use worker::{ArchiveWorker, WorkerHandle};
