//! API endpoint URL builders

/// Query submission endpoint (`POST {base}/`)
pub fn query_url(base_url: &str) -> String {
    format!("{}/", base_url.trim_end_matches('/'))
}

/// Archive listing endpoint
pub fn archives_url(base_url: &str) -> String {
    format!("{}/bulk-download/archives", base_url.trim_end_matches('/'))
}

/// Archive download endpoint.
///
/// `start` and `end` select the time-windowed variant of an archive and are
/// only sent when given.
pub fn archive_download_url(
    base_url: &str,
    name: &str,
    start: Option<&str>,
    end: Option<&str>,
) -> String {
    let mut url = format!(
        "{}/bulk-download/archives/download-archive?name={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(name)
    );

    if let Some(s) = start {
        url.push_str(&format!("&start={}", urlencoding::encode(s)));
    }

    if let Some(e) = end {
        url.push_str(&format!("&end={}", urlencoding::encode(e)));
    }

    url
}
