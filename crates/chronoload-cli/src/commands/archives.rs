//! `chronoload archives` command implementation
//!
//! Lists pre-built archives and downloads one with progress and Ctrl-C abort.

use crate::api::{build_http_client, ArchiveClient};
use crate::archive::{ArchiveRef, ArchiveWorker, WorkerCommand, WorkerEvent};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::progress::{self, format_bytes};
use chronoload_common::checksum::sha256_file;
use colored::Colorize;
use std::path::PathBuf;
use tracing::warn;

fn archive_client(config: &Config) -> Result<ArchiveClient> {
    let http = build_http_client(config.timeout())?;
    Ok(ArchiveClient::new(http, config.archive_url.as_str()))
}

/// List available archives
pub async fn list(config: Config) -> Result<()> {
    let archives = archive_client(&config)?.list_archives().await?;

    if archives.is_empty() {
        println!("No archives available.");
        return Ok(());
    }

    println!("{}", "Archives:".cyan().bold());
    for archive in &archives {
        println!(
            "  {}  {}  {}",
            archive.name.green(),
            format_bytes(archive.size),
            archive.checksum.as_deref().unwrap_or("-").dimmed()
        );
    }

    Ok(())
}

/// Download one archive and save it to `output`
pub async fn download(
    config: Config,
    name: String,
    start: Option<String>,
    end: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let client = archive_client(&config)?;

    let archive = match client.find_archive(&name).await? {
        Some(info) => ArchiveRef::from(info),
        None => {
            warn!(archive = %name, "Archive not in listing, downloading without size or checksum");
            ArchiveRef::named(&name)
        },
    };
    let output = output.unwrap_or_else(|| config.download_dir.join(&name));

    let (worker, mut events) = ArchiveWorker::new(client);
    let blobs = worker.blobs().clone();
    let handle = worker.spawn();

    handle.send(WorkerCommand::Download {
        archive: archive.clone(),
        offset: 0,
        start,
        end,
    })?;

    let pb = progress::create_archive_progress(&name, archive.size);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let ready = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                handle.send(WorkerCommand::abort(&name))?;
                pb.abandon_with_message(format!("Aborted {}", name));
                break None;
            },
            event = events.recv() => match event {
                Some(WorkerEvent::Progress { received, total, .. }) => {
                    progress::update_archive_progress(&pb, received, total);
                },
                Some(WorkerEvent::DownloadReady { url, .. }) => {
                    pb.finish_and_clear();
                    break Some(url);
                },
                Some(WorkerEvent::Error { error, .. }) => {
                    pb.abandon();
                    handle.shutdown().await;
                    return Err(PipelineError::Other(anyhow::anyhow!(
                        "download of '{}' failed: {}",
                        name,
                        error
                    )));
                },
                None => {
                    pb.abandon();
                    return Err(PipelineError::Other(anyhow::anyhow!("archive worker stopped")));
                },
            },
        }
    };

    handle.shutdown().await;

    let Some(url) = ready else {
        println!("{} Download of {} aborted", "!".yellow(), name);
        return Ok(());
    };

    let written = blobs.save(&url, &output).await?;
    blobs.revoke(&url).await;
    let digest = sha256_file(&output)?;

    println!(
        "{} {} ({}) saved to {}",
        "✓".green(),
        name,
        format_bytes(written),
        output.display()
    );
    println!("  SHA-256: {}", digest);

    Ok(())
}
