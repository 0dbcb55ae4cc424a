use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by a [`Transport`](crate::Transport).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// A network or connection-level failure; no HTTP status was received.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error body returned by the backend, verbatim.
        body: String,
    },

    /// The backend signalled temporary overload (HTTP 429).
    #[error("rate limited by backend")]
    RateLimited {
        /// How long the backend asked the caller to wait, if it said.
        retry_after: Option<Duration>,
    },

    /// The backend kept signalling overload after every allowed retry.
    #[error("backend still overloaded after {attempts} attempts")]
    RetriesExhausted {
        /// Total attempts made, including the first.
        attempts: u32,
    },

    /// A success response could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl TransportError {
    /// Returns `true` for the transient-overload signal, the only condition
    /// that is retried automatically.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// HTTP status associated with the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}
