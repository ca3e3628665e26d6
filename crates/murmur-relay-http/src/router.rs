//! Relay route table.
//!
//! The relay knows exactly two upstream operations, each reachable under an
//! OpenAI-style path and a short alias:
//!
//! | Path | Route | Body |
//! |---|---|---|
//! | `/v1/audio/transcriptions`, `/whisper` | [`Route::Transcription`] | `multipart/form-data` |
//! | `/v1/chat/completions`, `/chat` | [`Route::Chat`] | `application/json` |

use std::fmt;

use murmur_auth::canonical::{is_multipart_form, media_type};

use crate::config::RelayConfig;
use crate::error::RelayError;

/// An upstream operation the relay forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Audio transcription; multipart upload with a `file` field.
    Transcription,
    /// Chat completion; JSON body.
    Chat,
}

impl Route {
    /// Resolve a request path to a route.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::UnknownEndpoint`] for any other path.
    pub fn resolve(path: &str) -> Result<Self, RelayError> {
        match path {
            "/v1/audio/transcriptions" | "/whisper" => Ok(Self::Transcription),
            "/v1/chat/completions" | "/chat" => Ok(Self::Chat),
            _ => Err(RelayError::UnknownEndpoint),
        }
    }

    /// Check that a Content-Type is acceptable for this route.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidContentType`] with a route-specific message.
    pub fn validate_content_type(self, content_type: Option<&str>) -> Result<(), RelayError> {
        let content_type = content_type.unwrap_or_default();
        let valid = match self {
            Self::Transcription => is_multipart_form(content_type),
            Self::Chat => media_type(content_type).eq_ignore_ascii_case("application/json"),
        };
        if valid {
            Ok(())
        } else {
            Err(RelayError::InvalidContentType(self.content_type_message()))
        }
    }

    /// The configured upstream URL for this route.
    #[must_use]
    pub fn upstream_url(self, config: &RelayConfig) -> &str {
        match self {
            Self::Transcription => &config.transcription_url,
            Self::Chat => &config.chat_url,
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::Chat => "chat",
        }
    }

    fn content_type_message(self) -> &'static str {
        match self {
            Self::Transcription => "Content-Type must be multipart/form-data",
            Self::Chat => "Content-Type must be application/json",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
