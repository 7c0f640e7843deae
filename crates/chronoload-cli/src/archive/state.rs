//! Per-archive download state
//!
//! One entry per archive name. Every fetch holds a lease carrying the
//! generation it was started with; a newer `begin` for the same name bumps the
//! generation and cancels the old token, so a stale task finds its lease
//! rejected at its next suspension point and stops.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug)]
pub struct ArchiveDownloadState {
    pub received: u64,
    pub total: u64,
    /// Received segments, in order
    pub chunks: Vec<Bytes>,
    pub token: CancellationToken,
    pub generation: u64,
}

impl ArchiveDownloadState {
    fn fresh(total: u64, generation: u64) -> Self {
        Self {
            received: 0,
            total,
            chunks: Vec::new(),
            token: CancellationToken::new(),
            generation,
        }
    }
}

/// What a fetch task needs to know about the state it was started on
#[derive(Debug, Clone)]
pub struct Lease {
    pub generation: u64,
    pub token: CancellationToken,
    /// Byte offset the request should start from
    pub offset: u64,
    pub total: u64,
}

/// Read-only view of one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub received: u64,
    pub total: u64,
    pub segments: usize,
    pub cancelled: bool,
}

#[derive(Default)]
struct Inner {
    states: HashMap<String, ArchiveDownloadState>,
    next_generation: u64,
}

/// Process-wide table of archive states keyed by name
#[derive(Clone, Default)]
pub struct ArchiveStates {
    inner: Arc<Mutex<Inner>>,
}

impl ArchiveStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fetch for `name`, cancelling any fetch already running.
    ///
    /// Offset 0, or no existing state, starts from scratch with `size` as the
    /// total. A non-zero offset reuses the held segments and continues from the
    /// number of bytes actually held.
    pub async fn begin(&self, name: &str, size: u64, offset: u64) -> Lease {
        let mut inner = self.inner.lock().await;
        inner.next_generation += 1;
        let generation = inner.next_generation;

        let resumable = offset > 0 && inner.states.contains_key(name);
        if !resumable {
            let fresh = ArchiveDownloadState::fresh(size, generation);
            if let Some(old) = inner.states.insert(name.to_string(), fresh) {
                old.token.cancel();
            }
        }

        let state = inner
            .states
            .entry(name.to_string())
            .or_insert_with(|| ArchiveDownloadState::fresh(size, generation));

        if resumable {
            state.token.cancel();
            state.token = CancellationToken::new();
            state.generation = generation;
            if state.received != offset {
                warn!(
                    archive = name,
                    requested = offset,
                    held = state.received,
                    "Resume offset differs from held bytes, resuming from held bytes"
                );
            }
            if size > 0 && state.total == 0 {
                state.total = size;
            }
        }

        Lease {
            generation,
            token: state.token.clone(),
            offset: state.received,
            total: state.total,
        }
    }

    /// Drop held segments; used when a ranged request was answered in full
    pub async fn reset(&self, name: &str, generation: u64) -> bool {
        self.with_current(name, generation, |state| {
            state.chunks.clear();
            state.received = 0;
        })
        .await
        .is_some()
    }

    pub async fn set_total(&self, name: &str, generation: u64, total: u64) -> bool {
        self.with_current(name, generation, |state| state.total = total)
            .await
            .is_some()
    }

    /// Append a segment, returning `(received, total)` after it
    pub async fn append(&self, name: &str, generation: u64, segment: Bytes) -> Option<(u64, u64)> {
        self.with_current(name, generation, |state| {
            state.received += segment.len() as u64;
            state.chunks.push(segment);
            (state.received, state.total)
        })
        .await
    }

    /// Remove and return the state for assembly
    pub async fn finish(&self, name: &str, generation: u64) -> Option<ArchiveDownloadState> {
        let mut inner = self.inner.lock().await;
        let current = inner
            .states
            .get(name)
            .is_some_and(|state| state.generation == generation);
        if current {
            inner.states.remove(name)
        } else {
            None
        }
    }

    /// Remove the state after a terminal failure, unless a newer fetch owns it
    pub async fn discard(&self, name: &str, generation: u64) -> bool {
        self.finish(name, generation).await.is_some()
    }

    /// Cancel the fetch for `name`, keeping its segments for a later resume
    pub async fn cancel(&self, name: &str) -> bool {
        let inner = self.inner.lock().await;
        match inner.states.get(name) {
            Some(state) => {
                state.token.cancel();
                true
            },
            None => false,
        }
    }

    pub async fn snapshot(&self, name: &str) -> Option<StateSnapshot> {
        let inner = self.inner.lock().await;
        inner.states.get(name).map(|state| StateSnapshot {
            received: state.received,
            total: state.total,
            segments: state.chunks.len(),
            cancelled: state.token.is_cancelled(),
        })
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.states.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn with_current<T>(
        &self,
        name: &str,
        generation: u64,
        f: impl FnOnce(&mut ArchiveDownloadState) -> T,
    ) -> Option<T> {
        let mut inner = self.inner.lock().await;
        match inner.states.get_mut(name) {
            Some(state) if state.generation == generation => Some(f(state)),
            _ => None,
        }
    }
}
