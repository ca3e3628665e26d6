//! Verification of signed relay requests.
//!
//! [`verify_request_at`] runs the checks in a fixed order and stops at the
//! first failure:
//!
//! 1. All three `X-Murmur-*` headers are present.
//! 2. The timestamp parses and lies within [`FRESHNESS_WINDOW_SECS`] of now.
//! 3. The body hash is computed with the strategy selected by Content-Type.
//! 4. The expected signature over `timestamp:nonce:body_hash` is compared to
//!    the provided one in constant time.
//!
//! Nonces are not remembered between requests. A captured request verifies
//! again for as long as its timestamp stays fresh.

use tracing::debug;

use crate::canonical::{
    BodyHashStrategy, build_canonical_message, compute_signature, constant_time_eq,
};
use crate::error::AuthError;

/// Header carrying the Unix timestamp (seconds) the request was signed at.
pub const TIMESTAMP_HEADER: &str = "x-murmur-timestamp";
/// Header carrying the client-chosen nonce.
pub const NONCE_HEADER: &str = "x-murmur-nonce";
/// Header carrying the hex HMAC-SHA256 signature.
pub const SIGNATURE_HEADER: &str = "x-murmur-signature";

/// Maximum allowed distance, in seconds, between the signed timestamp and now.
///
/// The bound is inclusive: a timestamp exactly this far away is accepted.
pub const FRESHNESS_WINDOW_SECS: u64 = 300;

/// Verify a signed request against the current wall clock.
///
/// # Errors
///
/// See [`verify_request_at`].
pub fn verify_request(
    headers: &http::HeaderMap,
    body: &[u8],
    content_type: &str,
    secret: &[u8],
) -> Result<(), AuthError> {
    verify_request_at(
        headers,
        body,
        content_type,
        secret,
        chrono::Utc::now().timestamp(),
    )
}

/// Verify a signed request against an explicit clock (`now`, in Unix seconds).
///
/// # Errors
///
/// - [`AuthError::MissingHeaders`] if any signed header is absent.
/// - [`AuthError::TimestampInvalid`] if the timestamp does not parse or is stale.
/// - [`AuthError::MissingFile`] if a multipart body has no `file` part.
/// - [`AuthError::InvalidSignature`] if the signature does not match.
pub fn verify_request_at(
    headers: &http::HeaderMap,
    body: &[u8],
    content_type: &str,
    secret: &[u8],
    now: i64,
) -> Result<(), AuthError> {
    let (Some(timestamp), Some(nonce), Some(signature)) = (
        header_str(headers, TIMESTAMP_HEADER),
        header_str(headers, NONCE_HEADER),
        header_str(headers, SIGNATURE_HEADER),
    ) else {
        return Err(AuthError::MissingHeaders);
    };

    check_freshness(timestamp, now)?;

    let strategy = BodyHashStrategy::from_content_type(content_type);
    let body_hash = strategy.body_hash(body)?;

    let message = build_canonical_message(timestamp, nonce, &body_hash);
    let expected = compute_signature(secret, &message);

    if constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
        debug!(?strategy, "signature verification succeeded");
        Ok(())
    } else {
        debug!(?strategy, "signature mismatch");
        Err(AuthError::InvalidSignature)
    }
}

/// Check that `timestamp` is an integer no more than the window away from `now`.
fn check_freshness(timestamp: &str, now: i64) -> Result<(), AuthError> {
    let ts: i64 = timestamp.parse().map_err(|_| AuthError::TimestampInvalid)?;
    if now.abs_diff(ts) > FRESHNESS_WINDOW_SECS {
        return Err(AuthError::TimestampInvalid);
    }
    Ok(())
}

fn header_str<'a>(headers: &'a http::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}
