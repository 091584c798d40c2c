use crate::{
    cache::keys,
    error::{Result, StrainerError},
    headers, metrics,
    server::state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        StatusCode,
        header::{CONTENT_TYPE, HeaderName, HeaderValue},
    },
    response::Response,
};
use std::time::Instant;
use tracing::info;

const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Serve a cached rewritten manifest with its replayable upstream headers.
///
/// The cached header set was already filtered at publish time; the relay
/// policy is applied again here so a stale or hand-written cache entry can
/// never leak a hop-by-hop header to the player.
pub async fn serve_manifest(
    Path(key): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();
    info!("serving cached manifest for key: {key}");

    let Some(body) = state.cache.get_manifest(&key) else {
        metrics::record_request("manifest", 404);
        return Err(StrainerError::CacheMiss(key));
    };

    let mut response = Response::builder().status(StatusCode::OK);
    let mut has_content_type = false;
    if let Some(cached) = state.cache.get_headers(&keys::headers_key(&key)) {
        for (name, values) in &cached {
            if !headers::is_relayable(name) {
                continue;
            }
            let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
                continue;
            };
            if header_name == CONTENT_TYPE {
                has_content_type = true;
            }
            for value in values {
                let Ok(header_value) = HeaderValue::from_str(value) else {
                    continue;
                };
                response = response.header(header_name.clone(), header_value);
            }
        }
    }
    if !has_content_type {
        response = response.header(CONTENT_TYPE, HLS_CONTENT_TYPE);
    }

    metrics::record_request("manifest", 200);
    metrics::record_duration("manifest", start);

    response
        .body(Body::from(body))
        .map_err(|e| StrainerError::Server(e.to_string()))
}
