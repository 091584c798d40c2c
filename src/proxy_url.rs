//! Builders for locally-addressable proxy URLs.
//!
//! Pure string construction plus the opaque token codec used by the
//! segment repair route. The port is validated at configuration time;
//! nothing here performs I/O.

use crate::error::{Result, StrainerError};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use url::Url;

/// Loopback prefix the player is pointed at, e.g. `http://127.0.0.1:9710`.
pub fn build_prefix(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

/// URL under which a cached manifest is served.
pub fn build_manifest_url(prefix: &str, key: &str) -> String {
    format!("{prefix}/proxy-cache/{key}")
}

/// Base under which repaired segments are served; a token is appended.
pub fn build_segment_proxy_base(prefix: &str) -> String {
    format!("{prefix}/proxy/ts/")
}

/// Encode an original segment URI as an opaque path component.
pub fn encode_segment_token(uri: &str) -> String {
    URL_SAFE_NO_PAD.encode(uri.as_bytes())
}

/// Decode an opaque segment token back to the original URI.
///
/// # Errors
/// [`StrainerError::InvalidSegmentToken`] when the token is not valid
/// base64url or does not decode to a URL, and
/// [`StrainerError::UnsupportedScheme`] for anything but http(s) — the
/// proxy only ever mints tokens for plain HTTP upstreams.
pub fn decode_segment_token(token: &str) -> Result<Url> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| StrainerError::InvalidSegmentToken(e.to_string()))?;
    let uri = String::from_utf8(bytes)
        .map_err(|e| StrainerError::InvalidSegmentToken(e.to_string()))?;
    let url = Url::parse(&uri).map_err(|e| StrainerError::InvalidSegmentToken(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(StrainerError::UnsupportedScheme(scheme.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_loopback_with_port() {
        assert_eq!(build_prefix(9710), "http://127.0.0.1:9710");
    }

    #[test]
    fn manifest_url_nests_under_proxy_cache() {
        assert_eq!(
            build_manifest_url("http://127.0.0.1:9710", "ad-filtered.m3u8"),
            "http://127.0.0.1:9710/proxy-cache/ad-filtered.m3u8"
        );
    }

    #[test]
    fn segment_base_ends_with_slash() {
        assert_eq!(
            build_segment_proxy_base("http://127.0.0.1:9710"),
            "http://127.0.0.1:9710/proxy/ts/"
        );
    }

    #[test]
    fn token_roundtrip() {
        let original = "https://cdn.example.com/live/seg0001.ts?auth=abc";
        let token = encode_segment_token(original);

        // Token must be path-safe: no slashes, no padding.
        assert!(!token.contains('/'));
        assert!(!token.contains('='));

        let decoded = decode_segment_token(&token).unwrap();
        assert_eq!(decoded.as_str(), original);
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(decode_segment_token("!!not-base64!!").is_err());
    }

    #[test]
    fn token_decoding_to_non_url_is_rejected() {
        let token = URL_SAFE_NO_PAD.encode(b"not a url at all");
        assert!(decode_segment_token(&token).is_err());
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let token = encode_segment_token("file:///etc/passwd");
        assert!(matches!(
            decode_segment_token(&token),
            Err(StrainerError::UnsupportedScheme(_))
        ));
    }
}
