//! The resolution pipeline.
//!
//! `resolve` sequences fetch → ad filter → repair → publish, with
//! per-stage fallback: the fetch failing falls open to the original URL,
//! the filter and repair stages absorb their own failures as identity
//! results, and publishing only happens when a stage actually changed the
//! manifest. The same skip-when-unchanged check keeps an already-proxied
//! URL from being wrapped a second time.
//!
//! A newer `resolve` call supersedes older in-flight ones: each call takes
//! a monotonic ticket and compares it against the most recent one at the
//! point the result would be applied, discarding stale outcomes instead of
//! delivering them.

use crate::cache::{ContentCache, keys};
use crate::config::Config;
use crate::fetch;
use crate::headers;
use crate::hls::ad_filter::{self, FilterOptions};
use crate::hls::repair;
use crate::metrics;
use crate::proxy_url;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One playback resolution request from the player layer.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub source_url: String,
    /// Headers the upstream requires (referer, cookies, ...). The player
    /// cannot send these itself, which is why the proxy exists.
    pub headers: HashMap<String, String>,
    /// Sensitivity of the ad-filter duration heuristic.
    pub dynamic_threshold_factor: f64,
    /// Port of the in-process proxy server to address rewritten URLs at.
    pub local_port: u16,
}

/// Terminal output of a resolution, owned by the player layer for the
/// lifetime of one playback session.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlayback {
    pub final_url: String,
    pub headers: HashMap<String, String>,
    pub ad_filtered: bool,
}

/// Sequences the pipeline stages and guards against superseded results.
#[derive(Clone)]
pub struct Resolver {
    client: Client,
    cache: ContentCache,
    fetch_timeout: Duration,
    probe_timeout: Duration,
    latest: Arc<AtomicU64>,
}

impl Resolver {
    pub fn new(client: Client, cache: ContentCache, config: &Config) -> Self {
        Self {
            client,
            cache,
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Resolve a source URL into its playable form.
    ///
    /// Returns exactly once per call: `Some` with the outcome, or `None`
    /// when a newer call for the same resolver superseded this one. The
    /// worst-case outcome is the unmodified source URL — resolution never
    /// refuses a stream.
    pub async fn resolve(&self, req: ResolveRequest) -> Option<ResolvedPlayback> {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let prefix = proxy_url::build_prefix(req.local_port);

        let fetched = match fetch::fetch_manifest(
            &self.client,
            &req.source_url,
            &req.headers,
            self.fetch_timeout,
        )
        .await
        {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("manifest fetch failed, falling back to the source URL: {e}");
                metrics::record_resolution("fallback");
                return self.apply(
                    ticket,
                    ResolvedPlayback {
                        final_url: req.source_url,
                        headers: req.headers,
                        ad_filtered: false,
                    },
                );
            }
        };

        let filtered = ad_filter::filter(
            &req.source_url,
            &fetched.body,
            &FilterOptions {
                dynamic_threshold_factor: req.dynamic_threshold_factor,
            },
        );
        let ad_filtered = filtered.ad_entry_count > 0;

        let repaired = repair::repair(
            &self.client,
            &filtered.content,
            &req.source_url,
            &proxy_url::build_segment_proxy_base(&prefix),
            self.probe_timeout,
        )
        .await;

        let final_url = if ad_filtered || repaired.rewritten {
            let relay = headers::filter_relay_headers(&fetched.headers);
            self.cache
                .put_manifest(keys::AD_FILTERED_MANIFEST, repaired.content);
            self.cache
                .put_headers(&keys::headers_key(keys::AD_FILTERED_MANIFEST), relay);

            info!(
                ad_segments = filtered.ad_entry_count,
                repaired = repaired.rewritten,
                "republishing rewritten manifest for {}",
                req.source_url
            );
            metrics::record_resolution(if ad_filtered { "filtered" } else { "repaired" });
            proxy_url::build_manifest_url(&prefix, keys::AD_FILTERED_MANIFEST)
        } else {
            debug!("manifest unchanged, reusing the source URL: {}", req.source_url);
            metrics::record_resolution("unchanged");
            req.source_url.clone()
        };

        self.apply(
            ticket,
            ResolvedPlayback {
                final_url,
                headers: req.headers,
                ad_filtered,
            },
        )
    }

    /// Resolve in the background and hand the outcome to a completion
    /// callback. Superseded resolutions invoke nothing.
    pub fn resolve_detached(
        &self,
        req: ResolveRequest,
        callback: impl FnOnce(bool, String) + Send + 'static,
    ) {
        let resolver = self.clone();
        tokio::spawn(async move {
            if let Some(playback) = resolver.resolve(req).await {
                callback(playback.ad_filtered, playback.final_url);
            }
        });
    }

    /// Apply a finished resolution unless a newer one has started since.
    fn apply(&self, ticket: u64, playback: ResolvedPlayback) -> Option<ResolvedPlayback> {
        if self.latest.load(Ordering::SeqCst) == ticket {
            Some(playback)
        } else {
            debug!("resolution {ticket} superseded, discarding its result");
            metrics::record_resolution("superseded");
            None
        }
    }
}
