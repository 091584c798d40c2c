use crate::{cache::ContentCache, config::Config};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Shared HTTP client for connection pooling.
    pub http_client: Client,
    /// The content cache the resolution pipeline publishes into.
    pub cache: ContentCache,
}

impl AppState {
    /// Create a new AppState around the given configuration and cache.
    ///
    /// The cache is handed in rather than created here: the pipeline and
    /// the server must share the same instance.
    pub fn new(config: Config, cache: ContentCache) -> Self {
        let http_client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .expect("failed to create HTTP client");

        Self {
            config: Arc::new(config),
            http_client,
            cache,
        }
    }
}
