//! Process-wide content cache bridging the pipeline and the proxy server.
//!
//! The pipeline publishes the rewritten manifest and its replayable
//! upstream headers here; the server reads them back on every player
//! request. Each well-known key holds exactly one live value and a new
//! resolution overwrites the previous one, so there is no TTL and no
//! eviction — overwritten is deleted.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Well-known cache keys, one per logical stream role.
pub mod keys {
    /// The current ad-filtered (and possibly repair-rewritten) manifest.
    pub const AD_FILTERED_MANIFEST: &str = "ad-filtered.m3u8";

    /// Prefix for the replay-header entry associated with a manifest key.
    pub const PROXY_HEADERS_PREFIX: &str = "proxy-headers:";

    /// Key under which a manifest's replayable headers are stored.
    pub fn headers_key(manifest_key: &str) -> String {
        format!("{PROXY_HEADERS_PREFIX}{manifest_key}")
    }
}

/// A cached value: either manifest text or a set of replayable headers.
#[derive(Clone, Debug)]
pub enum CacheValue {
    Manifest(String),
    Headers(HashMap<String, Vec<String>>),
}

/// Thread-safe key/value store with last-writer-wins semantics per key.
///
/// Inserts swap the whole value atomically: a concurrent `get` observes
/// either the previous value or the new one, never a partial write.
#[derive(Clone, Debug, Default)]
pub struct ContentCache {
    entries: Arc<DashMap<String, CacheValue>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store manifest text under `key`, replacing any previous value.
    pub fn put_manifest(&self, key: &str, body: String) {
        self.entries.insert(key.to_string(), CacheValue::Manifest(body));
    }

    /// Fetch manifest text. `None` on a miss or if the key holds headers.
    pub fn get_manifest(&self, key: &str) -> Option<String> {
        match self.entries.get(key).map(|entry| entry.value().clone()) {
            Some(CacheValue::Manifest(body)) => Some(body),
            _ => None,
        }
    }

    /// Store a replay-header set under `key`, replacing any previous value.
    pub fn put_headers(&self, key: &str, headers: HashMap<String, Vec<String>>) {
        self.entries.insert(key.to_string(), CacheValue::Headers(headers));
    }

    /// Fetch a replay-header set. `None` on a miss or role mismatch.
    pub fn get_headers(&self, key: &str) -> Option<HashMap<String, Vec<String>>> {
        match self.entries.get(key).map(|entry| entry.value().clone()) {
            Some(CacheValue::Headers(headers)) => Some(headers),
            _ => None,
        }
    }

    /// Number of live entries (diagnostics only).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
