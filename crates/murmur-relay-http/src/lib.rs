//! HTTP layer of the Murmur relay.
//!
//! This crate accepts signed requests from the Murmur desktop client, checks
//! them, and forwards them to the speech/LLM provider with a server-held
//! bearer credential. The client never holds the provider key.
//!
//! - **Configuration** ([`config`]): [`RelayConfig`](config::RelayConfig),
//!   loaded from the environment.
//! - **Routing** ([`router`]): maps paths to the two upstream operations.
//! - **Service** ([`service`]): the [`RelayHttpService`](service::RelayHttpService)
//!   implementing hyper's `Service` trait.
//! - **Upstream** ([`upstream`]): the [`Upstream`](upstream::Upstream) seam and its
//!   `reqwest` implementation.
//! - **Throttle** ([`rate_limit`]) and **client identity** ([`client`]).
//! - **Responses** ([`response`], [`body`], [`error`]): error envelopes and CORS.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> RelayHttpService (hyper Service)
//!     -> CORS preflight interception
//!     -> method / configuration / size / route / Content-Type gates
//!     -> per-client throttle
//!     -> bounded body collection
//!     -> HMAC signature verification (murmur-auth)
//!     -> Upstream::forward (Authorization: Bearer <key>)
//!     -> CORS headers
//!   <- HTTP Response
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use murmur_relay_http::config::RelayConfig;
//! use murmur_relay_http::service::RelayHttpService;
//! use murmur_relay_http::upstream::HttpUpstream;
//!
//! let config = RelayConfig::from_env();
//! let upstream = HttpUpstream::new(Duration::from_secs(config.upstream_timeout_secs)).unwrap();
//! let service = RelayHttpService::new(upstream, config);
//! // Use `service` with hyper server.
//! ```

pub mod body;
pub mod client;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod response;
pub mod router;
pub mod service;
pub mod upstream;

pub use body::RelayBody;
pub use config::RelayConfig;
pub use error::RelayError;
pub use router::Route;
pub use service::RelayHttpService;
pub use upstream::{HttpUpstream, Upstream, UpstreamError, UpstreamRequest, UpstreamResponse};
