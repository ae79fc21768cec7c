//! Buffers an entire media resource for the seek fallback.

use crate::audio::is_remote;
use crate::cancellation::CancellationToken;
use anyhow::{Context, Result};
use lessonflow_core::MediaSource;
use std::fs;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const CHUNK_SIZE: usize = 64 * 1024;
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Blocking; run it off the event loop.
pub fn fetch_full_source(origin: &str, token: &CancellationToken) -> Result<MediaSource> {
    token.check_cancelled("start")?;
    let bytes = if is_remote(origin) {
        download(origin, token)?
    } else {
        fs::read(origin).with_context(|| format!("Reading {origin}"))?
    };
    token.check_cancelled("buffered")?;
    info!(origin, bytes = bytes.len(), "Buffered full media source");
    Ok(MediaSource::Buffered {
        origin: origin.to_string(),
        bytes: Arc::from(bytes),
    })
}

fn download(url: &str, token: &CancellationToken) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("Building HTTP client")?;
    let mut response = client
        .get(url)
        .send()
        .with_context(|| format!("Requesting {url}"))?
        .error_for_status()
        .with_context(|| format!("Fetching {url}"))?;
    let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        token.check_cancelled("download")?;
        let read = response
            .read(&mut chunk)
            .with_context(|| format!("Reading body of {url}"))?;
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..read]);
    }
    debug!(url, bytes = bytes.len(), "Download finished");
    Ok(bytes)
}
