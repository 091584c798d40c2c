//! Upstream HTTP fetching.
//!
//! Two shapes: the bounded, single-attempt manifest fetch used by the
//! resolution pipeline (failure there falls open to the original URL, so
//! retrying would only delay playback), and the retried segment fetch used
//! by the serving side, where a transient origin hiccup would otherwise
//! surface as a visible playback stall.

use crate::error::Result;
use crate::headers;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// Backoff before the single segment-fetch retry.
const SEGMENT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// A fetched manifest: body text plus the upstream response headers.
#[derive(Debug)]
pub struct FetchedManifest {
    pub body: String,
    pub headers: HeaderMap,
}

/// Fetch a manifest with the caller's headers and the fixed identifying
/// user agent, bounded by `timeout`. One attempt only.
///
/// # Errors
/// Any transport error, non-success status, or timeout. The caller treats
/// every error the same way: fall back to the original URL.
pub async fn fetch_manifest(
    client: &Client,
    url: &str,
    caller_headers: &HashMap<String, String>,
    timeout: Duration,
) -> Result<FetchedManifest> {
    let response = client
        .get(url)
        .headers(headers::upstream_request_headers(caller_headers))
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;

    let response_headers = response.headers().clone();
    let body = response.text().await?;

    Ok(FetchedManifest {
        body,
        headers: response_headers,
    })
}

/// Fetch a media segment, retrying once after a short backoff.
///
/// # Errors
/// The error of the second attempt once both fail.
pub async fn fetch_segment(client: &Client, url: &str, timeout: Duration) -> Result<Bytes> {
    match try_fetch_bytes(client, url, timeout).await {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            warn!("segment fetch failed for {url}, retrying once: {e}");
            tokio::time::sleep(SEGMENT_RETRY_BACKOFF).await;
            try_fetch_bytes(client, url, timeout).await
        }
    }
}

async fn try_fetch_bytes(client: &Client, url: &str, timeout: Duration) -> Result<Bytes> {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, headers::USER_AGENT)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;

    Ok(response.bytes().await?)
}
