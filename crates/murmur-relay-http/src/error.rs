//! Relay error types.
//!
//! Every gate in the relay pipeline fails with a [`RelayError`]. The display
//! string of each variant is the exact, fixed message returned to the caller
//! in the `{"error": ...}` envelope; diagnostic detail is only ever logged.

use http::StatusCode;

/// A terminal failure for one relayed request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// The request method is not `POST`.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The upstream credential or the signing secret is not configured.
    #[error("Proxy not configured")]
    NotConfigured,

    /// The declared or actual body size exceeds the configured limit.
    #[error("Request too large")]
    PayloadTooLarge,

    /// The path does not map to a known upstream route.
    #[error("Unknown endpoint")]
    UnknownEndpoint,

    /// The Content-Type does not match what the route expects.
    #[error("{0}")]
    InvalidContentType(&'static str),

    /// The local throttle rejected the request.
    #[error("Too many requests")]
    RateLimited,

    /// The request body could not be read.
    #[error("Invalid request body")]
    InvalidBody,

    /// Signature verification failed, for whatever reason.
    #[error("Unauthorized")]
    Unauthorized,

    /// The upstream could not be reached or did not answer in time.
    #[error("Proxy request failed")]
    UpstreamFailed,
}

impl RelayError {
    /// The HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnknownEndpoint => StatusCode::NOT_FOUND,
            Self::InvalidContentType(_) | Self::InvalidBody => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UpstreamFailed => StatusCode::BAD_GATEWAY,
        }
    }
}
