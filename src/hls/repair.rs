//! Segment container repair routing.
//!
//! Some upstreams serve transport-stream segments with foreign bytes
//! prepended (a disguised image header, typically), which embedded players
//! reject outright. The engine probes the first media segment with a small
//! bounded fetch; when the payload is misaligned but recoverable, every
//! segment URI is rewritten to route through the local repair endpoint,
//! where the leading garbage is stripped before the bytes reach the player.
//!
//! Every failure path — parse error, probe error, hopeless payload —
//! returns the identity result: repair is an enhancement, never a blocker.

use crate::headers;
use crate::proxy_url;
use crate::ts;
use m3u8_rs::{MediaPlaylist, Playlist, parse_playlist_res};
use reqwest::Client;
use reqwest::header::{RANGE, USER_AGENT};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Outcome of a repair pass.
///
/// `rewritten == false` guarantees `content` is the untouched input text.
#[derive(Debug)]
pub struct RepairResult {
    pub rewritten: bool,
    pub content: String,
}

impl RepairResult {
    fn identity(manifest_text: &str) -> Self {
        Self {
            rewritten: false,
            content: manifest_text.to_string(),
        }
    }
}

/// What the bounded probe concluded about the first segment.
#[derive(Debug, PartialEq, Eq)]
enum ProbeOutcome {
    /// Payload starts on an aligned sync pattern.
    Clean,
    /// Misaligned start with a recoverable sync run later in the window.
    NeedsRepair,
    /// Probe failed, or the payload is not a transport stream we can fix.
    Inconclusive,
}

/// Probe the manifest's first segment and, when a malformed container is
/// detected, rewrite all segment URIs onto `segment_proxy_base`.
pub async fn repair(
    client: &Client,
    manifest_text: &str,
    playlist_url: &str,
    segment_proxy_base: &str,
    probe_timeout: Duration,
) -> RepairResult {
    let playlist = match parse_playlist_res(manifest_text.as_bytes()) {
        Ok(Playlist::MediaPlaylist(p)) => p,
        Ok(Playlist::MasterPlaylist(_)) | Err(_) => return RepairResult::identity(manifest_text),
    };

    let Some(first_segment) = playlist.segments.first() else {
        return RepairResult::identity(manifest_text);
    };
    let Ok(base) = Url::parse(playlist_url) else {
        return RepairResult::identity(manifest_text);
    };
    let Ok(first_url) = base.join(&first_segment.uri) else {
        return RepairResult::identity(manifest_text);
    };

    match probe_segment(client, &first_url, probe_timeout).await {
        ProbeOutcome::NeedsRepair => {
            debug!("misaligned transport stream detected at {first_url}, routing through repair");
            match rewrite_segment_uris(playlist, &base, segment_proxy_base) {
                Some(content) => RepairResult {
                    rewritten: true,
                    content,
                },
                None => RepairResult::identity(manifest_text),
            }
        }
        ProbeOutcome::Clean | ProbeOutcome::Inconclusive => RepairResult::identity(manifest_text),
    }
}

/// Rewrite every segment URI to `{segment_proxy_base}{token}` and
/// serialize. `None` when serialization fails.
fn rewrite_segment_uris(
    mut playlist: MediaPlaylist,
    base: &Url,
    segment_proxy_base: &str,
) -> Option<String> {
    for segment in &mut playlist.segments {
        let Ok(absolute) = base.join(&segment.uri) else {
            // An unresolvable URI is left for the player to reject on its own.
            continue;
        };
        let token = proxy_url::encode_segment_token(absolute.as_str());
        segment.uri = format!("{segment_proxy_base}{token}");
    }

    let mut output = Vec::new();
    if let Err(e) = playlist.write_to(&mut output) {
        warn!("rewritten manifest failed to serialize: {e}");
        return None;
    }
    String::from_utf8(output).ok()
}

/// Fetch up to one probe window of the segment and judge its alignment.
/// Bounded by the Range request, the byte cap, and `probe_timeout`.
async fn probe_segment(client: &Client, url: &Url, probe_timeout: Duration) -> ProbeOutcome {
    let response = client
        .get(url.clone())
        .header(USER_AGENT, headers::USER_AGENT)
        .header(RANGE, format!("bytes=0-{}", ts::PROBE_WINDOW - 1))
        .timeout(probe_timeout)
        .send()
        .await;

    let mut response = match response {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            debug!("segment probe got status {} for {url}", r.status());
            return ProbeOutcome::Inconclusive;
        }
        Err(e) => {
            debug!("segment probe failed for {url}: {e}");
            return ProbeOutcome::Inconclusive;
        }
    };

    // Stream only as much as the window needs; upstreams that ignore the
    // Range header would otherwise hand us the whole segment.
    let mut window: Vec<u8> = Vec::with_capacity(ts::PROBE_WINDOW);
    loop {
        if window.len() >= ts::PROBE_WINDOW {
            break;
        }
        match response.chunk().await {
            Ok(Some(chunk)) => window.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(e) => {
                debug!("segment probe read failed for {url}: {e}");
                return ProbeOutcome::Inconclusive;
            }
        }
    }
    window.truncate(ts::PROBE_WINDOW);

    if window.is_empty() {
        return ProbeOutcome::Inconclusive;
    }
    if ts::starts_aligned(&window) {
        ProbeOutcome::Clean
    } else if ts::find_sync_offset(&window).is_some() {
        ProbeOutcome::NeedsRepair
    } else {
        ProbeOutcome::Inconclusive
    }
}
