//! Header manipulation between the client leg and the backend leg.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Add X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//! - Replace any client-supplied identity header with the verified subject
//!
//! # Design Decisions
//! - Headers listed in `Connection` are hop-by-hop too (RFC 9110 §7.6.1)
//! - Never trust an inbound X-User-Id

use std::net::IpAddr;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Headers meaningful only for a single transport leg.
pub const HOP_BY_HOP: [HeaderName; 9] = [
    header::HOST,
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Build the outbound header set for a backend request.
///
/// `original` must be the inbound headers before stripping, so the original
/// Host can be reported as X-Forwarded-Host.
pub fn outbound_headers(original: &HeaderMap, client_ip: IpAddr, subject: Option<&str>) -> HeaderMap {
    let mut headers = original.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(X_USER_ID);

    let forwarded_for = match original.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{}, {}", existing, client_ip),
        None => client_ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    if let Some(host) = original.get(header::HOST) {
        headers.insert(X_FORWARDED_HOST, host.clone());
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));

    if let Some(value) = subject.and_then(|s| HeaderValue::from_str(s).ok()) {
        headers.insert(X_USER_ID, value);
    }

    headers
}

/// First address in X-Forwarded-For, if it parses.
pub fn forwarded_client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(&X_FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-secret-hop"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-secret-hop", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert("x-trace-id", HeaderValue::from_static("abc"));
        headers.insert(X_USER_ID, HeaderValue::from_static("spoofed"));
        headers
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = inbound();
        strip_hop_by_hop(&mut headers);
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("keep-alive").is_none());
        assert!(headers.get("x-secret-hop").is_none());
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());
        assert!(headers.get(header::HOST).is_none());
        assert_eq!(headers["x-trace-id"], "abc");
    }

    #[test]
    fn test_outbound_headers() {
        let ip: IpAddr = "10.0.0.7".parse().unwrap();
        let headers = outbound_headers(&inbound(), ip, Some("42"));
        assert_eq!(headers[X_USER_ID], "42");
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.7");
        assert_eq!(headers[X_FORWARDED_HOST], "gateway.local");
        assert_eq!(headers[X_FORWARDED_PROTO], "http");
        assert_eq!(headers["x-trace-id"], "abc");
        assert!(headers.get(header::CONNECTION).is_none());
    }

    #[test]
    fn test_spoofed_identity_dropped_when_anonymous() {
        let ip: IpAddr = "10.0.0.7".parse().unwrap();
        let headers = outbound_headers(&inbound(), ip, None);
        assert!(headers.get(X_USER_ID).is_none());
    }

    #[test]
    fn test_forwarded_for_chain() {
        let mut original = HeaderMap::new();
        original.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        let ip: IpAddr = "10.0.0.7".parse().unwrap();
        let headers = outbound_headers(&original, ip, None);
        assert_eq!(headers[X_FORWARDED_FOR], "203.0.113.9, 10.0.0.1, 10.0.0.7");
        assert_eq!(forwarded_client_ip(&original), Some("203.0.113.9".parse().unwrap()));
    }
}
