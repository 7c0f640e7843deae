//! Common types used across chronoload

use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// HTTP Range Types
// ============================================================================

/// Parsed `Content-Range` response header.
///
/// Accepts the three shapes servers send for byte ranges:
///
/// - `bytes 1000-1499/1500`
/// - `bytes 1000-1499/*` (total unknown)
/// - `bytes */1500` (unsatisfied range)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRange {
    /// First and last byte of the returned segment, inclusive
    pub range: Option<(u64, u64)>,

    /// Declared total size of the full representation
    pub total: Option<u64>,
}

impl ContentRange {
    /// Number of bytes the segment covers, if a range was given and the
    /// count fits in a `u64`
    pub fn len(&self) -> Option<u64> {
        self.range.and_then(|(start, end)| (end - start).checked_add(1))
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_none()
    }
}

impl FromStr for ContentRange {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || CommonError::InvalidContentRange(s.to_string());

        let rest = s.trim().strip_prefix("bytes").ok_or_else(invalid)?.trim_start();
        let (range_part, total_part) = rest.split_once('/').ok_or_else(invalid)?;

        let total = match total_part.trim() {
            "*" => None,
            t => Some(t.parse::<u64>().map_err(|_| invalid())?),
        };

        let range = match range_part.trim() {
            "*" => None,
            r => {
                let (start, end) = r.split_once('-').ok_or_else(invalid)?;
                let start = start.trim().parse::<u64>().map_err(|_| invalid())?;
                let end = end.trim().parse::<u64>().map_err(|_| invalid())?;
                if end < start {
                    return Err(invalid());
                }
                Some((start, end))
            },
        };

        if range.is_none() && total.is_none() {
            return Err(invalid());
        }

        Ok(Self { range, total })
    }
}

/// Value for an open-ended `Range` request header starting at `offset`
pub fn range_from(offset: u64) -> String {
    format!("bytes={}-", offset)
}
