//! Error types for request signature verification.
//!
//! Every verification failure is one of four [`AuthError`] variants. The
//! display strings are fixed so that callers can log them verbatim; they are
//! intentionally coarse and never say which of the signed headers was missing.

/// Reasons a signed request can fail verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// At least one of `X-Murmur-Timestamp`, `X-Murmur-Nonce` or
    /// `X-Murmur-Signature` is absent or not valid header text.
    #[error("missing authentication headers")]
    MissingHeaders,

    /// The timestamp is not an integer, or lies outside the freshness window.
    #[error("timestamp expired or invalid")]
    TimestampInvalid,

    /// A multipart request carries no `file` part to hash.
    #[error("missing audio file in request")]
    MissingFile,

    /// The provided signature does not match the expected one.
    #[error("invalid signature")]
    InvalidSignature,
}
