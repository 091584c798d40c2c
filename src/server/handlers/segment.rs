use crate::{error::Result, fetch, metrics, proxy_url, server::state::AppState, ts};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::time::{Duration, Instant};
use tracing::info;

const TS_CONTENT_TYPE: &str = "video/MP2T";

/// Serve a repaired media segment.
///
/// The token decodes to the original upstream URI; the payload is fetched
/// (one retry), stripped of any leading non-TS bytes, and streamed to the
/// player as a plain transport stream.
pub async fn serve_segment(
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();

    let upstream = proxy_url::decode_segment_token(&token)
        .inspect_err(|_| metrics::record_request("segment", 400))?;

    info!("proxying segment from {upstream}");

    let timeout = Duration::from_secs(state.config.fetch_timeout_secs);
    match fetch::fetch_segment(&state.http_client, upstream.as_str(), timeout).await {
        Ok(bytes) => {
            let repaired = ts::strip_leading_garbage(bytes);

            metrics::record_request("segment", 200);
            metrics::record_duration("segment", start);

            Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, TS_CONTENT_TYPE)],
                Body::from(repaired),
            )
                .into_response())
        }
        Err(e) => {
            metrics::record_upstream_error();
            metrics::record_request("segment", 502);
            metrics::record_duration("segment", start);

            Err(e)
        }
    }
}
