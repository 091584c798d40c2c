//! Header relay policy.
//!
//! Three concerns: which headers travel upstream with our fetches, which
//! upstream response headers may be replayed to the player, and which are
//! hop-by-hop and must never be relayed once the body has been rewritten.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT as UA_KEY};
use std::collections::HashMap;

/// Fixed identifying user agent sent on every upstream request.
pub const USER_AGENT: &str = concat!("strainer/", env!("CARGO_PKG_VERSION"));

/// Hop-by-hop headers that become invalid once the body is rewritten.
/// Compared case-insensitively.
pub const EXCLUDED_RELAY_HEADERS: [&str; 2] = ["content-length", "transfer-encoding"];

/// Whether an upstream response header may be replayed to the player.
pub fn is_relayable(name: &str) -> bool {
    !EXCLUDED_RELAY_HEADERS
        .iter()
        .any(|excluded| name.eq_ignore_ascii_case(excluded))
}

/// Filter upstream response headers down to the set safe to replay.
///
/// Multi-valued headers keep all their values; non-UTF-8 values are
/// dropped rather than mangled.
pub fn filter_relay_headers(headers: &HeaderMap) -> HashMap<String, Vec<String>> {
    let mut relay: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in headers {
        if !is_relayable(name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            relay
                .entry(name.as_str().to_string())
                .or_default()
                .push(value.to_string());
        }
    }
    relay
}

/// Assemble the header map for an upstream request: the fixed user agent
/// first, then the caller's headers on top (the caller may override it).
/// Hop-by-hop names and headers with invalid names or values are skipped.
pub fn upstream_request_headers(caller: &HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(UA_KEY, HeaderValue::from_static(USER_AGENT));
    for (name, value) in caller {
        if !is_relayable(name) {
            continue;
        }
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        let Ok(value) = HeaderValue::from_str(value) else {
            continue;
        };
        headers.insert(name, value);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_headers_are_not_relayable() {
        assert!(!is_relayable("content-length"));
        assert!(!is_relayable("Content-Length"));
        assert!(!is_relayable("TRANSFER-ENCODING"));
        assert!(is_relayable("content-type"));
        assert!(is_relayable("cache-control"));
    }

    #[test]
    fn filter_drops_excluded_and_keeps_the_rest() {
        let mut upstream = HeaderMap::new();
        upstream.insert("content-type", HeaderValue::from_static("application/vnd.apple.mpegurl"));
        upstream.insert("content-length", HeaderValue::from_static("1234"));
        upstream.insert("transfer-encoding", HeaderValue::from_static("chunked"));

        let relay = filter_relay_headers(&upstream);

        assert_eq!(
            relay.get("content-type").map(Vec::as_slice),
            Some(&["application/vnd.apple.mpegurl".to_string()][..])
        );
        assert!(!relay.keys().any(|k| k.eq_ignore_ascii_case("content-length")));
        assert!(!relay.keys().any(|k| k.eq_ignore_ascii_case("transfer-encoding")));
    }

    #[test]
    fn filter_preserves_multi_valued_headers() {
        let mut upstream = HeaderMap::new();
        upstream.append("set-cookie", HeaderValue::from_static("a=1"));
        upstream.append("set-cookie", HeaderValue::from_static("b=2"));

        let relay = filter_relay_headers(&upstream);
        assert_eq!(relay["set-cookie"], vec!["a=1", "b=2"]);
    }

    #[test]
    fn upstream_request_carries_identifying_agent() {
        let headers = upstream_request_headers(&HashMap::new());
        assert_eq!(
            headers.get(UA_KEY).and_then(|v| v.to_str().ok()),
            Some(USER_AGENT)
        );
    }

    #[test]
    fn caller_headers_override_the_agent() {
        let caller = HashMap::from([
            ("User-Agent".to_string(), "Mozilla/5.0".to_string()),
            ("Referer".to_string(), "https://example.com/".to_string()),
        ]);

        let headers = upstream_request_headers(&caller);

        assert_eq!(
            headers.get(UA_KEY).and_then(|v| v.to_str().ok()),
            Some("Mozilla/5.0")
        );
        assert_eq!(
            headers.get("referer").and_then(|v| v.to_str().ok()),
            Some("https://example.com/")
        );
    }

    #[test]
    fn invalid_caller_headers_are_skipped() {
        let caller = HashMap::from([("bad name".to_string(), "x".to_string())]);
        let headers = upstream_request_headers(&caller);
        assert_eq!(headers.len(), 1, "only the user agent should remain");
    }

    #[test]
    fn hop_by_hop_caller_headers_are_not_forwarded() {
        let caller = HashMap::from([("Content-Length".to_string(), "42".to_string())]);
        let headers = upstream_request_headers(&caller);
        assert!(headers.get("content-length").is_none());
    }
}
