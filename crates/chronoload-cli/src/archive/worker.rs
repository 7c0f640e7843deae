//! Archive download worker

use super::blob::BlobStore;
use super::messages::{ArchiveRef, WorkerCommand, WorkerEvent};
use super::state::{ArchiveStates, Lease};
use crate::api::ArchiveClient;
use crate::error::{PipelineError, Result};
use bytes::{Bytes, BytesMut};
use chronoload_common::checksum::verify_sha256;
use chronoload_common::types::ContentRange;
use futures::StreamExt;
use reqwest::header::CONTENT_RANGE;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

/// Executes archive downloads and reports through an event channel.
///
/// Cheap to clone; clones share the state table, blob store and channel.
#[derive(Clone)]
pub struct ArchiveWorker {
    client: ArchiveClient,
    states: ArchiveStates,
    blobs: BlobStore,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl ArchiveWorker {
    pub fn new(client: ArchiveClient) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let worker = Self {
            client,
            states: ArchiveStates::new(),
            blobs: BlobStore::new(),
            events,
        };
        (worker, rx)
    }

    pub fn states(&self) -> &ArchiveStates {
        &self.states
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Act on one command.
    ///
    /// `Download` returns the handle of the spawned fetch task.
    pub async fn handle(&self, command: WorkerCommand) -> Option<JoinHandle<()>> {
        match command {
            WorkerCommand::Download {
                archive,
                offset,
                start,
                end,
            } => Some(self.start(archive, offset, start, end).await),
            WorkerCommand::Abort { archive } => {
                if self.states.cancel(&archive.name).await {
                    debug!(archive = %archive.name, "Abort requested");
                }
                None
            },
        }
    }

    /// Start or resume the download of `archive`
    pub async fn start(
        &self,
        archive: ArchiveRef,
        offset: u64,
        start: Option<String>,
        end: Option<String>,
    ) -> JoinHandle<()> {
        let lease = self.states.begin(&archive.name, archive.size, offset).await;
        let worker = self.clone();
        tokio::spawn(async move { worker.run(archive, lease, start, end).await })
    }

    /// Cancel the in-flight download of `name`, keeping what was received
    pub async fn abort(&self, name: &str) -> bool {
        self.states.cancel(name).await
    }

    /// Consume commands from a channel until every sender is dropped
    pub fn spawn(self) -> WorkerHandle {
        let (commands, mut rx) = mpsc::unbounded_channel::<WorkerCommand>();
        let task = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                self.handle(command).await;
            }
        });
        WorkerHandle { commands, task }
    }

    async fn run(self, archive: ArchiveRef, lease: Lease, start: Option<String>, end: Option<String>) {
        let name = archive.name.clone();

        match self
            .fetch(&archive, &lease, start.as_deref(), end.as_deref())
            .await
        {
            Ok(url) => {
                info!(archive = %name, %url, "Archive ready");
                self.emit(WorkerEvent::DownloadReady {
                    name,
                    url,
                    is_blob: true,
                });
            },
            Err(e) if e.is_abort() => {
                debug!(archive = %name, "Archive download aborted");
            },
            Err(e) => {
                self.states.discard(&name, lease.generation).await;
                error!(archive = %name, error = %e, "Archive download failed");
                self.emit(WorkerEvent::Error {
                    name,
                    error: e.to_string(),
                });
            },
        }
    }

    #[instrument(skip(self, archive, lease), fields(archive = %archive.name, offset = lease.offset))]
    async fn fetch(
        &self,
        archive: &ArchiveRef,
        lease: &Lease,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<String> {
        let name = archive.name.as_str();
        let generation = lease.generation;
        let request = self
            .client
            .download_request(name, lease.offset, start, end);

        let response = tokio::select! {
            biased;
            _ = lease.token.cancelled() => return Err(PipelineError::Aborted),
            response = request.send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::http_status(response.url().as_str(), status));
        }

        let mut base = lease.offset;
        if base > 0 && status != StatusCode::PARTIAL_CONTENT {
            warn!(status = status.as_u16(), "Range ignored by server, restarting from zero");
            self.live(self.states.reset(name, generation).await)?;
            base = 0;
        }

        if let Some(total) = declared_total(&response)? {
            self.live(self.states.set_total(name, generation, total).await)?;
        } else if lease.total == 0 {
            if let Some(len) = response.content_length() {
                self.live(self.states.set_total(name, generation, base + len).await)?;
            }
        }

        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                biased;
                _ = lease.token.cancelled() => return Err(PipelineError::Aborted),
                next = stream.next() => next,
            };

            let segment = match next {
                Some(segment) => segment?,
                None => break,
            };

            let (received, total) = self
                .states
                .append(name, generation, segment)
                .await
                .ok_or(PipelineError::Aborted)?;
            trace!(received, total, "Segment received");
            self.emit(WorkerEvent::Progress {
                name: name.to_string(),
                received,
                total,
            });
        }

        let state = self
            .states
            .finish(name, generation)
            .await
            .ok_or(PipelineError::Aborted)?;
        let data = assemble(&state.chunks, state.received);

        if let Some(expected) = archive.checksum.as_deref() {
            verify_sha256(&data, expected).map_err(|e| match e {
                chronoload_common::CommonError::ChecksumMismatch { expected, actual } => {
                    PipelineError::ChecksumMismatch {
                        name: name.to_string(),
                        expected,
                        actual,
                    }
                },
                other => other.into(),
            })?;
        }

        Ok(self.blobs.insert(data).await)
    }

    /// A replaced lease is treated like an abort: the stale task stops quietly
    fn live(&self, current: bool) -> Result<()> {
        if current {
            Ok(())
        } else {
            Err(PipelineError::Aborted)
        }
    }

    fn emit(&self, event: WorkerEvent) {
        // nobody listening is fine; the download result stays in the blob store
        let _ = self.events.send(event);
    }
}

/// Total size declared by the `Content-Range` header, if any
fn declared_total(response: &reqwest::Response) -> Result<Option<u64>> {
    let Some(value) = response.headers().get(CONTENT_RANGE) else {
        return Ok(None);
    };
    let header = value
        .to_str()
        .map_err(|_| PipelineError::protocol("Content-Range header is not ASCII"))?;
    let range: ContentRange = header.parse()?;
    Ok(range.total)
}

fn assemble(chunks: &[Bytes], len: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(len as usize);
    for chunk in chunks {
        buf.extend_from_slice(chunk);
    }
    buf.freeze()
}

/// Command side of a spawned worker
pub struct WorkerHandle {
    commands: mpsc::UnboundedSender<WorkerCommand>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn send(&self, command: WorkerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PipelineError::Other(anyhow::anyhow!("archive worker has stopped")))
    }

    /// Stop accepting commands and wait for the dispatch loop to end
    pub async fn shutdown(self) {
        drop(self.commands);
        let _ = self.task.await;
    }
}
