//! Canonical message construction and signature primitives.
//!
//! A request is signed over the canonical message
//!
//! ```text
//! <timestamp>:<nonce>:<hex(SHA256(payload))>
//! ```
//!
//! where the payload is the whole body for JSON requests and only the raw
//! `file` bytes for multipart uploads (see [`BodyHashStrategy`]). The
//! signature is the lowercase hex HMAC-SHA256 of that string under the shared
//! secret. Both ends must produce this string bit-for-bit.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AuthError;
use crate::multipart::{extract_boundary, extract_file_part};

type HmacSha256 = Hmac<Sha256>;

/// How the body of a request is reduced to the hash that gets signed.
///
/// Selected once per request from its Content-Type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyHashStrategy {
    /// Hash the entire raw body.
    Json,
    /// Hash only the raw bytes of the `file` part.
    Multipart {
        /// Boundary declared in the Content-Type, if any.
        boundary: Option<String>,
    },
}

impl BodyHashStrategy {
    /// Pick the strategy for a Content-Type value.
    ///
    /// Anything that is not `multipart/form-data` is treated as JSON.
    ///
    /// # Examples
    ///
    /// ```
    /// use murmur_auth::canonical::BodyHashStrategy;
    ///
    /// assert_eq!(
    ///     BodyHashStrategy::from_content_type("application/json"),
    ///     BodyHashStrategy::Json,
    /// );
    /// assert!(matches!(
    ///     BodyHashStrategy::from_content_type("multipart/form-data; boundary=b"),
    ///     BodyHashStrategy::Multipart { .. },
    /// ));
    /// ```
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Self {
        if is_multipart_form(content_type) {
            Self::Multipart {
                boundary: extract_boundary(content_type),
            }
        } else {
            Self::Json
        }
    }

    /// Compute the lowercase hex body hash for `body`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingFile`] if a multipart body has no boundary
    /// or no `file` part.
    pub fn body_hash(&self, body: &[u8]) -> Result<String, AuthError> {
        match self {
            Self::Json => Ok(hash_payload(body)),
            Self::Multipart { boundary } => {
                let boundary = boundary.as_deref().ok_or(AuthError::MissingFile)?;
                let file = extract_file_part(body, boundary).ok_or(AuthError::MissingFile)?;
                Ok(hash_payload(file.data))
            }
        }
    }
}

/// Whether a Content-Type names `multipart/form-data`, ignoring parameters and case.
#[must_use]
pub fn is_multipart_form(content_type: &str) -> bool {
    media_type(content_type).eq_ignore_ascii_case("multipart/form-data")
}

/// The media type portion of a Content-Type value (everything before the first `;`).
#[must_use]
pub fn media_type(content_type: &str) -> &str {
    content_type
        .split_once(';')
        .map_or(content_type, |(essence, _)| essence)
        .trim()
}

/// Compute the SHA-256 hash of a payload as a lowercase hex string.
///
/// # Examples
///
/// ```
/// use murmur_auth::canonical::hash_payload;
///
/// assert_eq!(
///     hash_payload(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Build the canonical message `timestamp:nonce:body_hash`.
#[must_use]
pub fn build_canonical_message(timestamp: &str, nonce: &str, body_hash: &str) -> String {
    format!("{timestamp}:{nonce}:{body_hash}")
}

/// Compute the lowercase hex HMAC-SHA256 of `message` under `secret`.
#[must_use]
pub fn compute_signature(secret: &[u8], message: &str) -> String {
    let mut mac = <HmacSha256 as KeyInit>::new_from_slice(secret)
        .expect("HMAC can accept keys of any length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes().to_vec())
}

/// Compare two byte strings without short-circuiting on the first difference.
///
/// A length mismatch returns early: signature length is fixed and public.
/// Otherwise every byte pair is XORed into an accumulator and only the final
/// accumulator is inspected.
#[must_use]
pub fn constant_time_eq(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in provided.iter().zip(expected) {
        diff |= a ^ b;
    }
    diff.ct_eq(&0).into()
}
