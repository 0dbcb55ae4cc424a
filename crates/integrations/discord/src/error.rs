use std::time::Duration;

use chanvault_transport::TransportError;
use thiserror::Error;

/// Errors specific to the Discord transport.
///
/// These are internal errors that get converted into [`TransportError`] at the
/// public API boundary.
#[derive(Debug, Error)]
pub enum DiscordError {
    /// An HTTP-level transport error occurred.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Discord API returned an error response.
    #[error("Discord API error: HTTP {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body as returned by Discord.
        body: String,
    },

    /// The request could not be built.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A success response carried a body that is not JSON.
    #[error("invalid response body: {0}")]
    InvalidResponse(String),

    /// The transport received an HTTP 429 (Too Many Requests) response.
    #[error("rate limited by Discord")]
    RateLimited {
        /// Wait time requested by Discord.
        retry_after: Option<Duration>,
    },
}

impl From<DiscordError> for TransportError {
    fn from(err: DiscordError) -> Self {
        match err {
            DiscordError::Http(e) => TransportError::Connection(e.to_string()),
            DiscordError::Api { status, body } => TransportError::Status { status, body },
            DiscordError::InvalidPayload(msg) => TransportError::Connection(msg),
            DiscordError::InvalidResponse(msg) => TransportError::Decode(msg),
            DiscordError::RateLimited { retry_after } => TransportError::RateLimited { retry_after },
        }
    }
}
