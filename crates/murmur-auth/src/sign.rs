//! Client-side request signing.
//!
//! Produces the three `X-Murmur-*` header values the relay expects. The
//! payload passed to [`sign_payload`] is the JSON body for chat requests and
//! the raw audio bytes, before multipart encoding, for transcription requests.

use http::HeaderValue;
use http::header::InvalidHeaderValue;
use rand::Rng;

use crate::canonical::{build_canonical_message, compute_signature, hash_payload};
use crate::verify::{NONCE_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Number of random bytes in a generated nonce (hex-encoded to twice as many chars).
const NONCE_BYTES: usize = 32;

/// The authentication header values for one signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// Unix seconds, decimal.
    pub timestamp: String,
    /// Hex-encoded random nonce.
    pub nonce: String,
    /// Lowercase hex HMAC-SHA256 over `timestamp:nonce:sha256(payload)`.
    pub signature: String,
}

impl SignedHeaders {
    /// Insert the three header values into `headers`, replacing existing ones.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHeaderValue`] if any value (in practice a caller-chosen
    /// nonce) cannot be sent as a header. `headers` is left untouched then.
    pub fn apply(&self, headers: &mut http::HeaderMap) -> Result<(), InvalidHeaderValue> {
        let timestamp = HeaderValue::from_str(&self.timestamp)?;
        let nonce = HeaderValue::from_str(&self.nonce)?;
        let signature = HeaderValue::from_str(&self.signature)?;
        headers.insert(TIMESTAMP_HEADER, timestamp);
        headers.insert(NONCE_HEADER, nonce);
        headers.insert(SIGNATURE_HEADER, signature);
        Ok(())
    }
}

/// Sign `payload` with a freshly generated nonce at time `now` (Unix seconds).
#[must_use]
pub fn sign_payload(payload: &[u8], secret: &[u8], now: i64) -> SignedHeaders {
    sign_payload_with_nonce(payload, secret, now, &generate_nonce())
}

/// Sign `payload` with a caller-chosen nonce.
#[must_use]
pub fn sign_payload_with_nonce(
    payload: &[u8],
    secret: &[u8],
    now: i64,
    nonce: &str,
) -> SignedHeaders {
    let timestamp = now.to_string();
    let message = build_canonical_message(&timestamp, nonce, &hash_payload(payload));
    SignedHeaders {
        signature: compute_signature(secret, &message),
        timestamp,
        nonce: nonce.to_owned(),
    }
}

/// Generate a nonce from 32 bytes of thread-local CSPRNG output, hex-encoded.
#[must_use]
pub fn generate_nonce() -> String {
    let mut rng = rand::rng();
    let mut buf = [0u8; NONCE_BYTES];
    rng.fill_bytes(&mut buf);
    hex::encode(buf)
}
