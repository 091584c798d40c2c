use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub type Result<T> = std::result::Result<T, StrainerError>;

#[derive(Debug, thiserror::Error)]
pub enum StrainerError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to fetch {url}: {reason}")]
    UpstreamFetch { url: String, reason: String },

    #[error("fetch timed out for {0}")]
    FetchTimeout(String),

    #[error("failed to parse manifest: {0}")]
    ManifestParse(String),

    #[error("failed to serialize manifest: {0}")]
    ManifestWrite(String),

    #[error("no cached entry for key: {0}")]
    CacheMiss(String),

    #[error("invalid segment token: {0}")]
    InvalidSegmentToken(String),

    #[error("scheme not allowed for upstream fetch: {0}")]
    UnsupportedScheme(String),

    #[error("server error: {0}")]
    Server(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl StrainerError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION",
            Self::UpstreamFetch { .. } => "UPSTREAM_FETCH",
            Self::FetchTimeout(_) => "FETCH_TIMEOUT",
            Self::ManifestParse(_) => "MANIFEST_PARSE",
            Self::ManifestWrite(_) => "MANIFEST_WRITE",
            Self::CacheMiss(_) => "CACHE_MISS",
            Self::InvalidSegmentToken(_) => "INVALID_SEGMENT_TOKEN",
            Self::UnsupportedScheme(_) => "UNSUPPORTED_SCHEME",
            Self::Server(_) => "SERVER",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::UpstreamFetch { .. } => StatusCode::BAD_GATEWAY,
            Self::FetchTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::CacheMiss(_) => StatusCode::NOT_FOUND,
            Self::InvalidSegmentToken(_) | Self::UnsupportedScheme(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) | Self::ManifestParse(_) | Self::ManifestWrite(_)
            | Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StrainerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.error_code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<reqwest::Error> for StrainerError {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(|u| u.to_string()).unwrap_or_default();
        if e.is_timeout() {
            Self::FetchTimeout(url)
        } else {
            Self::UpstreamFetch {
                url,
                reason: e.to_string(),
            }
        }
    }
}
