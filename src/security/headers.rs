//! Header sanitizing and the forwarded chain.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers before forwarding
//! - Strip every header that carried gateway credentials
//! - Add X-Forwarded-Host and X-Forwarded-Proto when absent
//! - Append the client IP to X-Forwarded-For
//!
//! # Design Decisions
//! - Values already set by an earlier proxy in the chain are kept
//! - The client IP is the peer address without its port

use std::net::{IpAddr, SocketAddr};

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::security::credentials::{API_KEY, X_API_KEY};

pub static X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Hop-by-hop headers, which apply to a single connection only.
pub static HOP_BY_HOP_HEADERS: &[&str] = &[
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
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Remove `Authorization`, the key headers and the configured credential header.
pub fn strip_credentials(headers: &mut HeaderMap, credential_header: &HeaderName) {
    headers.remove(header::AUTHORIZATION);
    headers.remove(credential_header);
    headers.remove(&API_KEY);
    headers.remove(&X_API_KEY);
}

/// Set `X-Forwarded-Host` unless an earlier hop already did.
pub fn set_forwarded_host(headers: &mut HeaderMap, host: Option<HeaderValue>) {
    if headers.contains_key(&X_FORWARDED_HOST) {
        return;
    }
    if let Some(host) = host {
        headers.insert(X_FORWARDED_HOST.clone(), host);
    }
}

/// Set `X-Forwarded-Proto` unless an earlier hop already did.
pub fn set_forwarded_proto(headers: &mut HeaderMap, proto: &'static str) {
    if !headers.contains_key(&X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO.clone(), HeaderValue::from_static(proto));
    }
}

/// Append the client IP to `X-Forwarded-For`, joining any existing values.
///
/// Prior values are kept byte for byte, including non-ASCII ones.
pub fn append_forwarded_for(headers: &mut HeaderMap, client_ip: IpAddr) {
    let mut chain: Vec<u8> = Vec::new();
    for value in headers.get_all(&X_FORWARDED_FOR) {
        let value = trim_ows(value.as_bytes());
        if value.is_empty() {
            continue;
        }
        if !chain.is_empty() {
            chain.extend_from_slice(b", ");
        }
        chain.extend_from_slice(value);
    }
    if !chain.is_empty() {
        chain.extend_from_slice(b", ");
    }
    chain.extend_from_slice(client_ip.to_string().as_bytes());

    // Joined from valid header values and an IP literal.
    if let Ok(value) = HeaderValue::from_bytes(&chain) {
        headers.insert(X_FORWARDED_FOR.clone(), value);
    }
}

/// Strip leading and trailing spaces and tabs.
fn trim_ows(bytes: &[u8]) -> &[u8] {
    let is_ows = |b: &u8| *b == b' ' || *b == b'\t';
    let start = bytes.iter().position(|b| !is_ows(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !is_ows(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Client IP from the peer address, with IPv4-mapped IPv6 unwrapped.
pub fn client_ip(remote: SocketAddr) -> IpAddr {
    match remote.ip() {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        ip => ip,
    }
}
