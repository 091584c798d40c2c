//! Advertisement filtering over HLS media playlists.
//!
//! Inserted ad segments almost always break the duration rhythm of the
//! surrounding content: a run of 2-second creatives spliced into a stream
//! of 6-second segments. The filter classifies duration outliers against a
//! threshold derived from the playlist's own duration distribution, scaled
//! by a user-tunable sensitivity factor, and removes them in place.
//!
//! The filter never fails: master playlists, unparseable input, and
//! playlists too short for meaningful statistics all come back as the
//! identity result.

use m3u8_rs::{MediaPlaylist, Playlist, parse_playlist_res};
use tracing::{debug, warn};

/// Sigma cutoff at sensitivity factor 1.0; the factor divides into this,
/// so higher factors classify more aggressively.
const BASE_SIGMA_CUTOFF: f64 = 3.0;

/// Absolute deviation floor as a fraction of the median duration. Keeps
/// encoder jitter in near-uniform playlists below the classification line.
const DEVIATION_FLOOR_FRACTION: f64 = 0.25;

/// Minimum number of segments for the duration statistics to mean anything.
const MIN_SEGMENTS_FOR_STATS: usize = 5;

/// Tuning knobs for [`filter`].
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Sensitivity multiplier; higher removes more aggressively.
    pub dynamic_threshold_factor: f64,
}

/// Outcome of a filter pass.
///
/// `ad_entry_count == 0` guarantees `content` is the untouched input text.
#[derive(Debug)]
pub struct AdFilterResult {
    pub content: String,
    pub ad_entry_count: usize,
}

impl AdFilterResult {
    fn identity(manifest_text: &str) -> Self {
        Self {
            content: manifest_text.to_string(),
            ad_entry_count: 0,
        }
    }
}

/// Remove advertisement segments from a media playlist.
///
/// Surviving entries keep their relative order. The first survivor after a
/// removed run is marked with a discontinuity, and the media-sequence
/// counter is advanced for removed leading entries so seek positions stay
/// consistent.
pub fn filter(source_url: &str, manifest_text: &str, options: &FilterOptions) -> AdFilterResult {
    let mut playlist = match parse_playlist_res(manifest_text.as_bytes()) {
        Ok(Playlist::MediaPlaylist(p)) => p,
        Ok(Playlist::MasterPlaylist(_)) => {
            debug!("master playlist, nothing to filter: {source_url}");
            return AdFilterResult::identity(manifest_text);
        }
        Err(e) => {
            warn!("manifest did not parse, skipping ad filter for {source_url}: {e:?}");
            return AdFilterResult::identity(manifest_text);
        }
    };

    let removed = remove_ad_segments(&mut playlist, options.dynamic_threshold_factor);
    if removed == 0 {
        return AdFilterResult::identity(manifest_text);
    }

    let mut output = Vec::new();
    if let Err(e) = playlist.write_to(&mut output) {
        warn!("filtered manifest failed to serialize for {source_url}: {e}");
        return AdFilterResult::identity(manifest_text);
    }
    match String::from_utf8(output) {
        Ok(content) => {
            debug!("removed {removed} ad segments from {source_url}");
            AdFilterResult {
                content,
                ad_entry_count: removed,
            }
        }
        Err(e) => {
            warn!("filtered manifest is not UTF-8 for {source_url}: {e}");
            AdFilterResult::identity(manifest_text)
        }
    }
}

/// Classify and remove duration outliers, returning how many were removed.
fn remove_ad_segments(playlist: &mut MediaPlaylist, factor: f64) -> usize {
    if playlist.segments.len() < MIN_SEGMENTS_FOR_STATS {
        return 0;
    }

    let durations: Vec<f64> = playlist
        .segments
        .iter()
        .map(|s| f64::from(s.duration))
        .collect();
    let threshold = match deviation_threshold(&durations, factor) {
        Some(t) => t,
        None => return 0,
    };

    let mean = durations.iter().sum::<f64>() / durations.len() as f64;
    let flagged: Vec<bool> = durations
        .iter()
        .map(|&d| (d - mean).abs() > threshold)
        .collect();

    let flagged_count = flagged.iter().filter(|&&f| f).count();
    if flagged_count == 0 || flagged_count == playlist.segments.len() {
        // Removing every segment would leave nothing to play; a playlist
        // that uniformly deviates from itself is a statistics artifact.
        return 0;
    }

    let mut kept = Vec::with_capacity(playlist.segments.len() - flagged_count);
    let mut leading_removed: u64 = 0;
    let mut after_removed_run = false;
    for (segment, &is_ad) in playlist.segments.drain(..).zip(flagged.iter()) {
        if is_ad {
            if kept.is_empty() {
                leading_removed += 1;
            }
            after_removed_run = true;
            continue;
        }
        let mut segment = segment;
        if after_removed_run {
            segment.discontinuity = true;
            after_removed_run = false;
        }
        kept.push(segment);
    }

    playlist.segments = kept;
    playlist.media_sequence += leading_removed;

    flagged_count
}

/// The deviation a segment duration must exceed to be classified as an ad:
/// a sigma cutoff scaled down by the sensitivity factor, floored at a
/// fraction of the median so jitter never qualifies.
fn deviation_threshold(durations: &[f64], factor: f64) -> Option<f64> {
    if !factor.is_finite() || factor <= 0.0 {
        return None;
    }

    let n = durations.len() as f64;
    let mean = durations.iter().sum::<f64>() / n;
    let variance = durations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let mut sorted = durations.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = sorted[sorted.len() / 2];

    let sigma_cutoff = (BASE_SIGMA_CUTOFF / factor) * std_dev;
    let floor = median * DEVIATION_FLOOR_FRACTION;
    Some(sigma_cutoff.max(floor))
}
