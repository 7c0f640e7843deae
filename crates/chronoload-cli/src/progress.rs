//! Progress indicators for query runs and archive downloads

use indicatif::{ProgressBar, ProgressStyle};

const BYTES_TEMPLATE: &str =
    "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})";

const CHUNKS_TEMPLATE: &str =
    "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} chunks";

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Byte progress for an archive download.
///
/// A zero `total` (size unknown) renders as a spinner until the first
/// progress event supplies one.
pub fn create_archive_progress(name: &str, total: u64) -> ProgressBar {
    let pb = if total > 0 {
        let pb = ProgressBar::new(total);
        pb.set_style(bar_style(BYTES_TEMPLATE));
        pb
    } else {
        create_spinner("")
    };
    pb.set_message(format!("Downloading {}", name));
    pb
}

/// Update an archive bar from a progress event
pub fn update_archive_progress(pb: &ProgressBar, received: u64, total: u64) {
    if total > 0 && pb.length() != Some(total) {
        pb.set_length(total);
        pb.set_style(bar_style(BYTES_TEMPLATE));
    }
    pb.set_position(received);
}

/// Chunk-count progress for a query run
pub fn create_chunk_progress(total_chunks: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total_chunks);
    pb.set_style(bar_style(CHUNKS_TEMPLATE));
    pb.set_message(message.to_string());
    pb
}

/// Spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
