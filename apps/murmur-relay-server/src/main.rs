//! Murmur relay server.
//!
//! Accepts signed requests from the Murmur desktop client and relays them to
//! the speech/LLM provider with the server-held API key.
//!
//! # Usage
//!
//! ```text
//! GROQ_API_KEY=gsk_... MURMUR_APP_SECRET=... murmur-relay-server
//! murmur-relay-server --health-check
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_LISTEN` | `0.0.0.0:8787` | Bind address |
//! | `GROQ_API_KEY` | *(unset)* | Upstream bearer credential |
//! | `MURMUR_APP_SECRET` | *(unset)* | HMAC secret shared with the client |
//! | `IP_HASH_SALT` | *(unset)* | Salt for hashed client identifiers |
//! | `UPSTREAM_TRANSCRIPTION_URL` | Groq | Transcription endpoint |
//! | `UPSTREAM_CHAT_URL` | Groq | Chat completions endpoint |
//! | `MAX_BODY_SIZE` | `10485760` | Request body limit in bytes |
//! | `UPSTREAM_TIMEOUT_SECS` | `30` | Upstream call timeout |
//! | `RATE_LIMIT_PER_MINUTE` | `0` | Per-client throttle, `0` disables |
//! | `TRUST_PROXY_HEADERS` | `false` | Key the throttle on `CF-Connecting-IP` / `X-Forwarded-For` |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use murmur_relay_http::{HttpUpstream, RelayConfig, RelayHttpService, Upstream};

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve<U: Upstream>(listener: TcpListener, service: RelayHttpService<U>) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.with_peer(peer_addr);
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Check a running relay with a CORS preflight, which needs no credentials.
///
/// Succeeds only on a `204` answer.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("OPTIONS / HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if is_healthy_response(&response) {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

fn is_healthy_response(response: &str) -> bool {
    response.starts_with("HTTP/1.1 204")
}

/// Address to connect to for a configured bind address.
fn loopback_address(listen: &str) -> String {
    listen.replace("0.0.0.0", "127.0.0.1")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --health-check flag for container health checks.
    if std::env::args().any(|a| a == "--health-check") {
        let config = RelayConfig::from_env();
        let healthy = run_health_check(&loopback_address(&config.listen)).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    let config = RelayConfig::from_env();

    init_tracing(&config.log_level)?;

    info!(
        listen = %config.listen,
        max_body_size = config.max_body_size,
        upstream_timeout_secs = config.upstream_timeout_secs,
        rate_limit_per_minute = config.rate_limit_per_minute,
        version = VERSION,
        "starting Murmur relay",
    );
    if !config.is_configured() {
        warn!("GROQ_API_KEY or MURMUR_APP_SECRET is not set; relayed requests will fail with 500");
    }

    let upstream = HttpUpstream::new(Duration::from_secs(config.upstream_timeout_secs))
        .context("failed to build upstream client")?;

    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.listen))?;

    let service = RelayHttpService::new(upstream, config);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service).await
}
