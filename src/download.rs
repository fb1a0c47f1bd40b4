//! Source archive download with timeout and progress tracking

use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Url;
use std::time::Duration;

const USER_AGENT: &str = concat!("brewsmith/", env!("CARGO_PKG_VERSION"));

/// Upper bound on how much a declared Content-Length may pre-allocate
const MAX_PREALLOCATION: u64 = 64 << 20;

/// Fetch the archive at `url` into memory.
///
/// `http(s)` URLs are downloaded with `timeout` bounding the whole transfer;
/// `file` URLs are read from the local filesystem. Any failure, including a
/// non-2xx status, is a [`Error::Network`].
pub async fn fetch(url: &Url, timeout: Duration, show_progress: bool) -> Result<Vec<u8>> {
    let bytes = match url.scheme() {
        "file" => fetch_file(url).await?,
        _ => fetch_http(url, timeout, show_progress).await?,
    };
    tracing::debug!("Fetched {} bytes from {}", bytes.len(), url);
    Ok(bytes)
}

async fn fetch_file(url: &Url) -> Result<Vec<u8>> {
    let path = url.to_file_path().map_err(|_| Error::Network {
        url: url.to_string(),
        reason: "not a local file path".to_string(),
    })?;

    tokio::fs::read(&path).await.map_err(|e| Error::Network {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

async fn fetch_http(url: &Url, timeout: Duration, show_progress: bool) -> Result<Vec<u8>> {
    let network_error = |e: reqwest::Error| Error::Network {
        url: url.to_string(),
        reason: describe_request_error(&e, timeout),
    };

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(network_error)?;

    let mut response = client.get(url.clone()).send().await.map_err(network_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Network {
            url: url.to_string(),
            reason: format!("HTTP {}", status),
        });
    }

    let pb = if show_progress {
        let pb = ProgressBar::new(response.content_length().unwrap_or(0));
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        let file_name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();
        pb.set_message(format!("⬇ {}", file_name));
        pb
    } else {
        ProgressBar::hidden()
    };

    let declared = response.content_length();
    let capacity = declared.unwrap_or(0).min(MAX_PREALLOCATION);
    let mut bytes = Vec::with_capacity(capacity as usize);
    while let Some(chunk) = response.chunk().await.map_err(|e| {
        pb.abandon();
        network_error(e)
    })? {
        bytes.extend_from_slice(&chunk);
        if let Some(declared) = declared
            && bytes.len() as u64 > declared
        {
            pb.abandon();
            return Err(Error::Network {
                url: url.to_string(),
                reason: format!("received more than the declared {} bytes", declared),
            });
        }
        pb.set_position(bytes.len() as u64);
    }

    pb.finish_and_clear();
    Ok(bytes)
}

fn describe_request_error(e: &reqwest::Error, timeout: Duration) -> String {
    if e.is_timeout() {
        format!("timed out after {}s", timeout.as_secs())
    } else if e.is_connect() {
        format!("could not connect: {}", e)
    } else {
        e.to_string()
    }
}
