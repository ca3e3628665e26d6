//! The relay HTTP service implementing hyper's `Service` trait.
//!
//! [`RelayHttpService`] runs every request through a fixed sequence of gates
//! and forwards it upstream only if all of them pass:
//!
//! 1. CORS preflight (`OPTIONS`) answered immediately, without authentication
//! 2. Method must be `POST`
//! 3. Upstream credential and signing secret must be configured
//! 4. Declared `Content-Length` must not exceed the body limit
//! 5. Path must map to a [`Route`]
//! 6. Content-Type must match the route
//! 7. Per-client throttle pre-check (when enabled), which records nothing
//! 8. Body read, bounded by the same limit
//! 9. Signature verification, after which the throttle records the hit
//! 10. Forward to the [`Upstream`] with the bearer credential injected
//!
//! Every response, success or error, carries the CORS header set.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::Service;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::body::RelayBody;
use crate::client::client_id;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::rate_limit::RateLimiter;
use crate::response::{error_to_response, preflight_response, upstream_to_response};
use crate::router::Route;
use crate::upstream::{Upstream, UpstreamRequest};

/// The relay service.
///
/// Cheap to clone; all clones share the upstream client, configuration and
/// throttle state.
///
/// # Type Parameters
///
/// - `U`: The outbound transport implementing [`Upstream`].
#[derive(Debug)]
pub struct RelayHttpService<U: Upstream> {
    upstream: Arc<U>,
    config: Arc<RelayConfig>,
    limiter: Arc<RateLimiter>,
    peer: Option<SocketAddr>,
}

impl<U: Upstream> RelayHttpService<U> {
    /// Create a service with the given upstream and configuration.
    #[must_use]
    pub fn new(upstream: U, config: RelayConfig) -> Self {
        Self::from_shared(Arc::new(upstream), config)
    }

    /// Create a service from an `Arc<U>` upstream and configuration.
    #[must_use]
    pub fn from_shared(upstream: Arc<U>, config: RelayConfig) -> Self {
        let limiter = RateLimiter::new(config.rate_limit_per_minute);
        Self {
            upstream,
            config: Arc::new(config),
            limiter: Arc::new(limiter),
            peer: None,
        }
    }

    /// A clone of this service bound to one connection's peer address.
    #[must_use]
    pub fn with_peer(&self, peer: SocketAddr) -> Self {
        Self {
            peer: Some(peer),
            ..self.clone()
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Run one request through the relay pipeline.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<RelayBody>
    where
        B: http_body::Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        debug!(%method, %path, request_id, "processing relay request");

        let response = match self.process(req, &request_id).await {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, request_id, "relay request rejected");
                error_to_response(&err)
            }
        };

        info!(
            %method,
            %path,
            status = response.status().as_u16(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            request_id,
            "relay request completed"
        );
        response
    }

    async fn process<B>(
        &self,
        req: http::Request<B>,
        request_id: &str,
    ) -> Result<http::Response<RelayBody>, RelayError>
    where
        B: http_body::Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let config = self.config.as_ref();

        if req.method() == http::Method::OPTIONS {
            return Ok(preflight_response());
        }
        if req.method() != http::Method::POST {
            return Err(RelayError::MethodNotAllowed);
        }

        let (Some(api_key), Some(secret)) = (
            config.upstream_api_key.as_deref(),
            config.app_secret.as_deref(),
        ) else {
            error!(request_id, "relay is missing its upstream key or signing secret");
            return Err(RelayError::NotConfigured);
        };

        if declared_length(req.headers()).is_some_and(|len| len > config.max_body_size) {
            return Err(RelayError::PayloadTooLarge);
        }

        let route = Route::resolve(req.uri().path())?;

        let content_type = req
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        route.validate_content_type(content_type.as_deref())?;
        let content_type = content_type.unwrap_or_default();

        let client = client_id(
            req.headers(),
            self.peer,
            config.trust_proxy_headers,
            config.ip_hash_salt.as_deref().unwrap_or_default(),
        );
        if let Err(err) = self.limiter.precheck(&client) {
            warn!(%route, client, request_id, "client throttled");
            return Err(err);
        }

        let (parts, body) = req.into_parts();
        let body = collect_limited(body, config.max_body_size).await?;

        if let Err(reason) =
            murmur_auth::verify_request(&parts.headers, &body, &content_type, secret.as_bytes())
        {
            warn!(%route, client, %reason, request_id, "signature verification failed");
            return Err(RelayError::Unauthorized);
        }

        if let Err(err) = self.limiter.check(&client) {
            warn!(%route, client, request_id, "client throttled");
            return Err(err);
        }

        info!(%route, client, body_len = body.len(), request_id, "forwarding to upstream");

        let upstream_response = self
            .upstream
            .forward(UpstreamRequest {
                url: route.upstream_url(config).to_owned(),
                content_type,
                api_key: api_key.to_owned(),
                body,
            })
            .await
            .map_err(|err| {
                error!(%route, error = %err, request_id, "upstream request failed");
                RelayError::UpstreamFailed
            })?;

        Ok(upstream_to_response(upstream_response))
    }
}

impl<U: Upstream> Clone for RelayHttpService<U> {
    fn clone(&self) -> Self {
        Self {
            upstream: Arc::clone(&self.upstream),
            config: Arc::clone(&self.config),
            limiter: Arc::clone(&self.limiter),
            peer: self.peer,
        }
    }
}

impl<U: Upstream> Service<http::Request<Incoming>> for RelayHttpService<U> {
    type Response = http::Response<RelayBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}

/// The declared `Content-Length`, if present and parseable.
fn declared_length(headers: &http::HeaderMap) -> Option<usize> {
    headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Collect a request body, refusing to buffer more than `limit` bytes.
async fn collect_limited<B>(body: B, limit: usize) -> Result<Bytes, RelayError>
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(RelayError::PayloadTooLarge)
        }
        Err(err) => {
            debug!(error = %err, "failed to read request body");
            Err(RelayError::InvalidBody)
        }
    }
}
