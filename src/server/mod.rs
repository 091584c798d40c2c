//! The in-process proxy server.
//!
//! Republishes whatever the resolution pipeline put in the content cache:
//! the rewritten manifest under `/proxy-cache/{key}` and repaired segments
//! under `/proxy/ts/{token}`. Binds loopback only — the server exists so
//! the local player can fetch rewritten streams without carrying custom
//! headers, not to serve a network.

pub mod handlers;
pub mod state;

use crate::cache::ContentCache;
use crate::config::Config;
use crate::error::{Result, StrainerError};
use crate::metrics;
use axum::{
    Router,
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use state::AppState;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Response header carrying the crate version.
const VERSION_HEADER: &str = "x-strainer-version";

/// Build the router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route(
            "/proxy-cache/{key}",
            get(handlers::manifest::serve_manifest),
        )
        .route("/proxy/ts/{token}", get(handlers::segment::serve_segment))
        .route("/metrics", get(serve_metrics))
        .layer(middleware::from_fn(version_header))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn version_header(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        VERSION_HEADER,
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}

async fn serve_metrics() -> String {
    metrics::prometheus_handle().render()
}

/// Bind loopback and serve until shutdown.
pub async fn start(config: Config, cache: ContentCache) -> Result<()> {
    let addr = format!("127.0.0.1:{}", config.port);
    let state = AppState::new(config, cache);
    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {addr}: {e}");
            return Err(StrainerError::Configuration(format!(
                "cannot bind {addr}: {e}"
            )));
        }
    };

    info!("local proxy listening on http://{addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("server error: {e}");
        return Err(StrainerError::Server(e.to_string()));
    }

    Ok(())
}
