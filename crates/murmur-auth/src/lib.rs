//! HMAC-SHA256 request signing and verification for the Murmur relay.
//!
//! The desktop client signs every relayed request with a secret shared with
//! the relay. The relay recomputes the signature and rejects anything stale,
//! forged, or altered.
//!
//! # Wire format
//!
//! | Header | Value |
//! |---|---|
//! | `X-Murmur-Timestamp` | Unix seconds |
//! | `X-Murmur-Nonce` | opaque client-chosen string |
//! | `X-Murmur-Signature` | `hex(HMAC-SHA256(secret, "{timestamp}:{nonce}:{body_hash}"))` |
//!
//! `body_hash` is the lowercase hex SHA-256 of the full body for JSON
//! requests, and of the raw `file` part for `multipart/form-data` uploads.
//!
//! # Usage
//!
//! ```rust
//! use murmur_auth::{sign_payload, verify_request_at};
//!
//! let secret = b"shared-secret";
//! let body = br#"{"model":"x","messages":[]}"#;
//! let now = 1_700_000_000;
//!
//! let mut headers = http::HeaderMap::new();
//! sign_payload(body, secret, now).apply(&mut headers)?;
//!
//! assert!(verify_request_at(&headers, body, "application/json", secret, now).is_ok());
//! # Ok::<(), http::header::InvalidHeaderValue>(())
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - Body hashing, canonical message, HMAC and constant-time compare
//! - [`error`] - Verification failure reasons
//! - [`multipart`] - Extraction of the signed `file` part from multipart bodies
//! - [`sign`] - Client-side signing
//! - [`verify`] - Server-side verification

pub mod canonical;
pub mod error;
pub mod multipart;
pub mod sign;
pub mod verify;

pub use canonical::{BodyHashStrategy, hash_payload};
pub use error::AuthError;
pub use sign::{SignedHeaders, sign_payload};
pub use verify::{
    FRESHNESS_WINDOW_SECS, NONCE_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER, verify_request,
    verify_request_at,
};
