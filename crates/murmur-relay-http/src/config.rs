//! Relay configuration.
//!
//! Provides [`RelayConfig`], loaded from environment variables (or secret
//! bindings exposed as environment variables) via [`RelayConfig::from_env`].
//! Secret values are never serialized and are redacted from `Debug` output.

use std::fmt;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Default upstream endpoint for audio transcription.
pub const DEFAULT_TRANSCRIPTION_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";
/// Default upstream endpoint for chat completions.
pub const DEFAULT_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
/// Default request body limit (10 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Relay configuration.
///
/// # Examples
///
/// ```
/// use murmur_relay_http::config::RelayConfig;
///
/// let config = RelayConfig::default();
/// assert_eq!(config.max_body_size, 10 * 1024 * 1024);
/// assert!(!config.is_configured());
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Bind address (e.g. `"0.0.0.0:8787"`).
    #[builder(default = String::from("0.0.0.0:8787"))]
    pub listen: String,

    /// Bearer credential injected into every upstream request.
    #[serde(skip_serializing)]
    #[builder(default, setter(strip_option))]
    pub upstream_api_key: Option<String>,

    /// Secret shared with the client for HMAC request signing.
    #[serde(skip_serializing)]
    #[builder(default, setter(strip_option))]
    pub app_secret: Option<String>,

    /// Salt mixed into hashed client identifiers before they are logged.
    #[serde(skip_serializing)]
    #[builder(default, setter(strip_option))]
    pub ip_hash_salt: Option<String>,

    /// Upstream URL for the transcription route.
    #[builder(default = String::from(DEFAULT_TRANSCRIPTION_URL))]
    pub transcription_url: String,

    /// Upstream URL for the chat route.
    #[builder(default = String::from(DEFAULT_CHAT_URL))]
    pub chat_url: String,

    /// Maximum accepted request body size in bytes.
    #[builder(default = DEFAULT_MAX_BODY_SIZE)]
    pub max_body_size: usize,

    /// Timeout for the whole upstream call, in seconds.
    #[builder(default = 30)]
    pub upstream_timeout_secs: u64,

    /// Per-client requests per minute for the local throttle; `0` disables it.
    #[builder(default = 0)]
    pub rate_limit_per_minute: u32,

    /// Key the throttle on `CF-Connecting-IP` / `X-Forwarded-For` instead of
    /// the TCP peer. Enable only when a proxy that overwrites those headers
    /// sits in front of the relay.
    #[builder(default = false)]
    pub trust_proxy_headers: bool,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("listen", &self.listen)
            .field("upstream_api_key", &redacted(self.upstream_api_key.as_ref()))
            .field("app_secret", &redacted(self.app_secret.as_ref()))
            .field("ip_hash_salt", &redacted(self.ip_hash_salt.as_ref()))
            .field("transcription_url", &self.transcription_url)
            .field("chat_url", &self.chat_url)
            .field("max_body_size", &self.max_body_size)
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn redacted(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| "...")
}

impl RelayConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `RELAY_LISTEN` | `0.0.0.0:8787` |
    /// | `GROQ_API_KEY` | *(unset)* |
    /// | `MURMUR_APP_SECRET` | *(unset)* |
    /// | `IP_HASH_SALT` | *(unset)* |
    /// | `UPSTREAM_TRANSCRIPTION_URL` | Groq transcription endpoint |
    /// | `UPSTREAM_CHAT_URL` | Groq chat completions endpoint |
    /// | `MAX_BODY_SIZE` | `10485760` |
    /// | `UPSTREAM_TIMEOUT_SECS` | `30` |
    /// | `RATE_LIMIT_PER_MINUTE` | `0` |
    /// | `TRUST_PROXY_HEADERS` | `false` |
    /// | `LOG_LEVEL` | `info` |
    ///
    /// Empty secret variables are treated as unset. Unparseable numbers keep
    /// their defaults. `TRUST_PROXY_HEADERS` accepts `true` or `1`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let secret = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(v) = lookup("RELAY_LISTEN") {
            config.listen = v;
        }
        config.upstream_api_key = secret("GROQ_API_KEY");
        config.app_secret = secret("MURMUR_APP_SECRET");
        config.ip_hash_salt = secret("IP_HASH_SALT");
        if let Some(v) = lookup("UPSTREAM_TRANSCRIPTION_URL") {
            config.transcription_url = v;
        }
        if let Some(v) = lookup("UPSTREAM_CHAT_URL") {
            config.chat_url = v;
        }
        if let Some(n) = lookup("MAX_BODY_SIZE").and_then(|v| v.parse().ok()) {
            config.max_body_size = n;
        }
        if let Some(n) = lookup("UPSTREAM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.upstream_timeout_secs = n;
        }
        if let Some(n) = lookup("RATE_LIMIT_PER_MINUTE").and_then(|v| v.parse().ok()) {
            config.rate_limit_per_minute = n;
        }
        if let Some(v) = lookup("TRUST_PROXY_HEADERS") {
            config.trust_proxy_headers = matches!(v.trim(), "1" | "true" | "TRUE" | "True");
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// Whether both the upstream credential and the signing secret are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.upstream_api_key.is_some() && self.app_secret.is_some()
    }
}
