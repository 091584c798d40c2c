use std::collections::HashMap;
use strainer::cache::ContentCache;
use strainer::config::Config;
use strainer::pipeline::{ResolveRequest, Resolver};
use strainer::server;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    info!("starting strainer — local HLS ad-filter and repair proxy");

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let cache = ContentCache::new();

    // An optional source URL on the command line resolves once at startup;
    // the playable local URL lands in the log for manual use.
    if let Some(source_url) = std::env::args().nth(1) {
        if config.ad_filter && source_url.contains(".m3u8") {
            let resolver = Resolver::new(reqwest::Client::new(), cache.clone(), &config);
            let request = ResolveRequest {
                source_url,
                headers: HashMap::new(),
                dynamic_threshold_factor: config.dynamic_threshold_factor,
                local_port: config.port,
            };
            resolver.resolve_detached(request, |ad_filtered, final_url| {
                info!(ad_filtered, "resolved playable URL: {final_url}");
            });
        } else {
            info!("ad filter disabled or not a playlist URL, play directly: {source_url}");
        }
    }

    if let Err(e) = server::start(config, cache).await {
        error!("failed to start server: {e}");
        std::process::exit(1);
    }
}
