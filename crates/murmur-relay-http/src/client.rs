//! Client identification for throttling and logs.
//!
//! The relay never logs a raw client address. Addresses are reduced to a
//! salted, truncated SHA-256 digest before they reach the throttle or a log
//! line.

use std::net::SocketAddr;

use sha2::{Digest, Sha256};

/// Header set by the edge proxy with the original client address.
pub const CF_CONNECTING_IP: &str = "cf-connecting-ip";
/// Standard proxy chain header; the first entry is the client.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Hex characters kept from the client digest.
const CLIENT_ID_LEN: usize = 16;

/// Determine the client address for a request.
///
/// With `trust_proxy_headers` set, prefers `CF-Connecting-IP`, then the first
/// `X-Forwarded-For` entry. Otherwise those headers are caller-controlled and
/// ignored. The TCP peer address is the fallback in both cases.
#[must_use]
pub fn client_address(
    headers: &http::HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> Option<String> {
    let peer_ip = peer.map(|addr| addr.ip().to_string());
    if !trust_proxy_headers {
        return peer_ip;
    }

    let from_header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(ip) = from_header(CF_CONNECTING_IP) {
        return Some(ip.to_owned());
    }
    if let Some(first) = from_header(X_FORWARDED_FOR)
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(first.to_owned());
    }
    peer_ip
}

/// Hash a client address with `salt` into a short opaque identifier.
#[must_use]
pub fn hash_client_id(address: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(address.as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(CLIENT_ID_LEN);
    id
}

/// The hashed identifier for a request, or `"unknown"` when no address is known.
#[must_use]
pub fn client_id(
    headers: &http::HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
    salt: &str,
) -> String {
    client_address(headers, peer, trust_proxy_headers).map_or_else(
        || "unknown".to_owned(),
        |address| hash_client_id(&address, salt),
    )
}
