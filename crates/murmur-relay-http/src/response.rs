//! Response construction: error envelopes, relayed upstream responses, and CORS.
//!
//! Every response the relay produces carries the same CORS header set,
//! whether it is a preflight, an error, or a relayed upstream answer.

use http::header::{CONTENT_TYPE, HeaderValue};

use crate::body::RelayBody;
use crate::error::RelayError;
use crate::upstream::UpstreamResponse;

/// Content type for relay-generated JSON and the fallback for upstream responses.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// The CORS headers attached to every response.
pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "POST, OPTIONS"),
    (
        "access-control-allow-headers",
        "Content-Type, X-Murmur-Timestamp, X-Murmur-Nonce, X-Murmur-Signature",
    ),
    ("access-control-max-age", "86400"),
];

/// Serialize an error into the `{"error": "<message>"}` envelope.
#[must_use]
pub fn error_to_json(error: &RelayError) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({ "error": error.to_string() }))
        .expect("JSON serialization of error cannot fail")
}

/// Convert a [`RelayError`] into a complete HTTP error response.
#[must_use]
pub fn error_to_response(error: &RelayError) -> http::Response<RelayBody> {
    let mut response = http::Response::new(RelayBody::from_bytes(error_to_json(error)));
    *response.status_mut() = error.status_code();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    add_cors_headers(response)
}

/// Relay an upstream response: same status and body, upstream Content-Type
/// when present, `application/json` otherwise.
#[must_use]
pub fn upstream_to_response(upstream: UpstreamResponse) -> http::Response<RelayBody> {
    let content_type = upstream
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or(HeaderValue::from_static(JSON_CONTENT_TYPE));

    let mut response = http::Response::new(RelayBody::from_string(upstream.body));
    *response.status_mut() = upstream.status;
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    add_cors_headers(response)
}

/// Produce the CORS preflight response: no body, no authentication.
#[must_use]
pub fn preflight_response() -> http::Response<RelayBody> {
    let mut response = http::Response::new(RelayBody::empty());
    *response.status_mut() = http::StatusCode::NO_CONTENT;
    add_cors_headers(response)
}

/// Insert the CORS header set, replacing any existing values.
#[must_use]
pub fn add_cors_headers(mut response: http::Response<RelayBody>) -> http::Response<RelayBody> {
    let headers = response.headers_mut();
    for (name, value) in CORS_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}
