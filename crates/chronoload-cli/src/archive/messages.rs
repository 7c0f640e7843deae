//! Messages exchanged with the archive worker
//!
//! Both directions are tagged by a `type` field so they can cross a JSON
//! boundary unchanged.

use crate::api::ArchiveInfo;
use serde::{Deserialize, Serialize};

/// Archive identity as carried in worker messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveRef {
    pub name: String,

    /// Caller's size estimate; 0 when unknown
    #[serde(default)]
    pub size: u64,

    /// Published SHA-256 of the whole archive, hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl ArchiveRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            checksum: None,
        }
    }
}

impl From<ArchiveInfo> for ArchiveRef {
    fn from(info: ArchiveInfo) -> Self {
        Self {
            name: info.name,
            size: info.size,
            checksum: info.checksum,
        }
    }
}

/// Inbound commands
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerCommand {
    /// Start, restart (offset 0) or resume (offset > 0) a download
    Download {
        archive: ArchiveRef,
        #[serde(default)]
        offset: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<String>,
    },

    /// Cancel the in-flight download for `archive.name`
    Abort { archive: ArchiveRef },
}

impl WorkerCommand {
    pub fn download(archive: ArchiveRef) -> Self {
        Self::Download {
            archive,
            offset: 0,
            start: None,
            end: None,
        }
    }

    pub fn resume(archive: ArchiveRef, offset: u64) -> Self {
        Self::Download {
            archive,
            offset,
            start: None,
            end: None,
        }
    }

    pub fn abort(name: impl Into<String>) -> Self {
        Self::Abort {
            archive: ArchiveRef::named(name),
        }
    }

    pub fn archive_name(&self) -> &str {
        match self {
            Self::Download { archive, .. } | Self::Abort { archive } => &archive.name,
        }
    }
}

/// Outbound notifications
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerEvent {
    /// Sent after every received segment
    Progress { name: String, received: u64, total: u64 },

    /// The archive is assembled and can be saved from `url`
    DownloadReady {
        name: String,
        url: String,
        #[serde(rename = "isBlob")]
        is_blob: bool,
    },

    Error { name: String, error: String },
}

impl WorkerEvent {
    pub fn name(&self) -> &str {
        match self {
            Self::Progress { name, .. }
            | Self::DownloadReady { name, .. }
            | Self::Error { name, .. } => name,
        }
    }
}
