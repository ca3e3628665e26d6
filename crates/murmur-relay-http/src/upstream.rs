//! Outbound calls to the upstream provider.
//!
//! [`Upstream`] is the seam between the relay pipeline and the network. The
//! production implementation, [`HttpUpstream`], uses a shared `reqwest`
//! client with a bounded timeout. Tests substitute canned implementations.
//!
//! The returned future owns the in-flight call: dropping it (for example
//! when the client disconnects and hyper drops the request future) abandons
//! the outbound request.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

/// Boxed future returned by [`Upstream::forward`].
pub type UpstreamFuture =
    Pin<Box<dyn Future<Output = Result<UpstreamResponse, UpstreamError>> + Send>>;

/// A request ready to be sent upstream.
///
/// Carries only what the upstream may see: no client header is forwarded
/// besides the original Content-Type.
#[derive(Clone)]
pub struct UpstreamRequest {
    /// Absolute upstream URL.
    pub url: String,
    /// The original request's Content-Type, unchanged.
    pub content_type: String,
    /// Server-held bearer credential.
    pub api_key: String,
    /// The original request body, unchanged.
    pub body: Bytes,
}

impl std::fmt::Debug for UpstreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamRequest")
            .field("url", &self.url)
            .field("content_type", &self.content_type)
            .field("api_key", &"...")
            .field("body_len", &self.body.len())
            .finish()
    }
}

impl UpstreamRequest {
    /// The `Authorization` header value sent upstream.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.api_key)
    }
}

/// The upstream's answer, read in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    /// Upstream status code, relayed as is.
    pub status: http::StatusCode,
    /// Upstream Content-Type, if it sent one.
    pub content_type: Option<String>,
    /// Upstream body as text.
    pub body: String,
}

/// Failures talking to the upstream.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The HTTP client could not be constructed.
    #[error("failed to build upstream client: {0}")]
    Build(#[source] reqwest::Error),

    /// The upstream did not answer within the configured timeout.
    #[error("upstream request timed out")]
    Timeout,

    /// Connecting, sending, or reading the response failed.
    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }
}

/// Sends relayed requests to the upstream provider.
pub trait Upstream: Send + Sync + 'static {
    /// Issue `request` as a POST and read the full response.
    fn forward(&self, request: UpstreamRequest) -> UpstreamFuture;
}

/// [`Upstream`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    /// Create a client whose calls are bounded by `timeout` end to end.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Build`] if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UpstreamError::Build)?;
        Ok(Self { client })
    }
}

impl Upstream for HttpUpstream {
    fn forward(&self, request: UpstreamRequest) -> UpstreamFuture {
        let client = self.client.clone();
        Box::pin(async move {
            let authorization = request.authorization();
            let response = client
                .post(&request.url)
                .header(AUTHORIZATION, authorization)
                .header(CONTENT_TYPE, request.content_type)
                .body(request.body)
                .send()
                .await?;

            let status = response.status();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned);
            let body = response.text().await?;

            debug!(%status, body_len = body.len(), "received upstream response");

            Ok(UpstreamResponse {
                status,
                content_type,
                body,
            })
        })
    }
}
