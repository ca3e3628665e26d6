//! End-to-end tests for the Murmur relay.
//!
//! Each test starts an in-process relay on an ephemeral port, pointed at an
//! in-process mock upstream, and drives it over real HTTP with `reqwest`.
//! Requests are signed with `murmur-auth` exactly as the desktop client
//! signs them.
//!
//! ```text
//! cargo test -p murmur-integration
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;

use murmur_auth::sign_payload;
use murmur_relay_http::{HttpUpstream, RelayConfig, RelayHttpService};

/// Signing secret shared by the test client and relay.
pub const SECRET: &str = "integration-app-secret";
/// Upstream credential the relay injects.
pub const API_KEY: &str = "gsk_integration_key";
/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "----murmur-integration";

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A request as received by the mock upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method.
    pub method: http::Method,
    /// Request path.
    pub path: String,
    /// All received headers.
    pub headers: http::HeaderMap,
    /// Full request body.
    pub body: Bytes,
}

impl RecordedRequest {
    /// A header value as a string, if present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// What the mock upstream answers with.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    /// Status code.
    pub status: http::StatusCode,
    /// Content-Type header, if any.
    pub content_type: Option<String>,
    /// Response body.
    pub body: String,
    /// Delay before answering.
    pub delay: Option<Duration>,
}

impl CannedResponse {
    /// A `200` JSON answer.
    #[must_use]
    pub fn json(body: &str) -> Self {
        Self {
            status: http::StatusCode::OK,
            content_type: Some("application/json".to_owned()),
            body: body.to_owned(),
            delay: None,
        }
    }
}

/// An in-process stand-in for the speech/LLM provider.
#[derive(Debug)]
pub struct MockUpstream {
    addr: SocketAddr,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockUpstream {
    /// Start serving `canned` for every request.
    ///
    /// # Errors
    ///
    /// Fails if no local port can be bound.
    pub async fn start(canned: CannedResponse) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let recorded = Arc::new(Mutex::new(Vec::new()));

        let shared = Arc::clone(&recorded);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorded = Arc::clone(&shared);
                let canned = canned.clone();
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: http::Request<Incoming>| {
                        let recorded = Arc::clone(&recorded);
                        let canned = canned.clone();
                        async move { answer(req, &recorded, canned).await }
                    });
                    let _ = HttpConnBuilder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), svc)
                        .await;
                });
            }
        });

        Ok(Self { addr, recorded })
    }

    /// Absolute URL for `path` on this upstream.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.recorded
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

async fn answer(
    req: http::Request<Incoming>,
    recorded: &Mutex<Vec<RecordedRequest>>,
    canned: CannedResponse,
) -> Result<http::Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();
    recorded
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .push(RecordedRequest {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            headers: parts.headers,
            body,
        });

    if let Some(delay) = canned.delay {
        tokio::time::sleep(delay).await;
    }

    let mut response = http::Response::new(Full::new(Bytes::from(canned.body)));
    *response.status_mut() = canned.status;
    if let Some(ct) = canned
        .content_type
        .and_then(|ct| http::HeaderValue::from_str(&ct).ok())
    {
        response.headers_mut().insert(http::header::CONTENT_TYPE, ct);
    }
    Ok(response)
}

/// A relay configuration pointing at `upstream`, with both secrets set.
#[must_use]
pub fn relay_config(upstream: &MockUpstream) -> RelayConfig {
    RelayConfig::builder()
        .listen("127.0.0.1:0".into())
        .upstream_api_key(API_KEY.into())
        .app_secret(SECRET.into())
        .ip_hash_salt("integration-salt".into())
        .transcription_url(upstream.url("/openai/v1/audio/transcriptions"))
        .chat_url(upstream.url("/openai/v1/chat/completions"))
        .upstream_timeout_secs(5)
        .build()
}

/// Serve a relay with `config` on an ephemeral port; returns its base URL.
///
/// # Errors
///
/// Fails if no local port can be bound or the upstream client cannot be built.
pub async fn spawn_relay(config: RelayConfig) -> Result<String> {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let upstream = HttpUpstream::new(Duration::from_secs(config.upstream_timeout_secs))?;
    let service = RelayHttpService::new(upstream, config);

    tokio::spawn(async move {
        let http = HttpConnBuilder::new(TokioExecutor::new());
        while let Ok((stream, peer)) = listener.accept().await {
            let conn = http
                .serve_connection(TokioIo::new(stream), service.with_peer(peer))
                .into_owned();
            tokio::spawn(async move {
                let _ = conn.await;
            });
        }
    });

    Ok(format!("http://{addr}"))
}

/// An HTTP client for driving the relay.
#[must_use]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::new()
}

/// Headers for a request signed now over `signed_over`.
///
/// # Panics
///
/// Panics if `content_type` is not a valid header value.
#[must_use]
pub fn signed_headers(content_type: &str, signed_over: &[u8]) -> http::HeaderMap {
    signed_headers_at(content_type, signed_over, chrono::Utc::now().timestamp())
}

/// Headers for a request signed at Unix time `timestamp` over `signed_over`.
///
/// # Panics
///
/// Panics if `content_type` is not a valid header value.
#[must_use]
pub fn signed_headers_at(content_type: &str, signed_over: &[u8], timestamp: i64) -> http::HeaderMap {
    let mut headers = http::HeaderMap::new();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_str(content_type).expect("valid content type"),
    );
    sign_payload(signed_over, SECRET.as_bytes(), timestamp)
        .apply(&mut headers)
        .expect("signed header values are valid");
    headers
}

/// Only the three signature headers, signed now over `signed_over`.
///
/// For requests whose Content-Type is set by the HTTP client, such as
/// `reqwest` multipart forms.
#[must_use]
pub fn signature_headers(signed_over: &[u8]) -> http::HeaderMap {
    let mut headers = http::HeaderMap::new();
    sign_payload(signed_over, SECRET.as_bytes(), chrono::Utc::now().timestamp())
        .apply(&mut headers)
        .expect("signed header values are valid");
    headers
}

/// The Content-Type for bodies built by [`multipart_body`].
#[must_use]
pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// A transcription upload: the given text fields followed by a `file` part.
#[must_use]
pub fn multipart_body(fields: &[(&str, &str)], audio: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"recording.wav\"\r\nContent-Type: audio/wav\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(audio);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Assert the full CORS header set on a relay response.
///
/// # Panics
///
/// Panics if any CORS header is missing or wrong.
pub fn assert_cors(response: &reqwest::Response) {
    for (name, value) in murmur_relay_http::response::CORS_HEADERS {
        assert_eq!(
            response.headers().get(name).and_then(|v| v.to_str().ok()),
            Some(value),
            "header {name}"
        );
    }
}

/// Read a relay error envelope and return its message.
///
/// # Panics
///
/// Panics if the body is not `{"error": "<string>"}`.
pub async fn error_message(response: reqwest::Response) -> String {
    let json: serde_json::Value = response.json().await.expect("JSON error body");
    json["error"].as_str().expect("error string").to_owned()
}

mod test_transcription;
