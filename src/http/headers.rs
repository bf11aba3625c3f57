//! Header manipulation for forwarded requests and relayed responses.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Add X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//! - Stamp relayed responses with X-Proxied-By
//! - Derive the correlation id used in logs and error bodies
//!
//! # Design Decisions
//! - Preserve an existing X-Forwarded-For chain and append the peer address
//! - The target sees its own authority in Host; the client's goes to X-Forwarded-Host
//! - Headers are prepared once per request, not once per attempt

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Method, Uri};

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
pub const X_PROXIED_BY: &str = "x-proxied-by";

/// Value of the X-Proxied-By response header.
pub const PROXIED_BY: &str = concat!("velocity-gateway/", env!("CARGO_PKG_VERSION"));

const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Rewrite inbound request headers for forwarding.
pub fn prepare_forward_headers(headers: &mut HeaderMap, uri: &Uri, client_addr: Option<SocketAddr>) {
    let original_host = headers.get(header::HOST).cloned().or_else(|| {
        uri.authority()
            .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
    });

    strip_hop_by_hop(headers);

    if let Some(host) = original_host {
        headers.insert(X_FORWARDED_HOST, host);
    }

    if let Some(addr) = client_addr {
        let peer = addr.ip().to_string();
        let prior: Vec<&str> = headers
            .get_all(X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        let chain = if prior.is_empty() {
            peer
        } else {
            format!("{}, {}", prior.join(", "), peer)
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if !headers.contains_key(X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }

    headers.remove(header::HOST);
}

/// Rewrite target response headers before relaying them.
pub fn finish_response_headers(headers: &mut HeaderMap) {
    strip_hop_by_hop(headers);
    headers.insert(X_PROXIED_BY, HeaderValue::from_static(PROXIED_BY));
}

/// The inbound X-Request-Id, or `<unix-nanos>-<METHOD>` when absent.
pub fn correlation_id(headers: &HeaderMap, method: &Method) -> String {
    if let Some(id) = headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return id.to_string();
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{}-{}", nanos, method)
}
