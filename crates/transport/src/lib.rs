//! Transport contract between the chanvault store and a message backend.
//!
//! The store never talks HTTP directly: it builds [`ApiRequest`]s and hands
//! them to a [`Transport`]. Backends live in their own crates (the Discord
//! HTTP client, the in-memory channel used by tests). [`RetryTransport`]
//! wraps any backend with the bounded retry policy for rate limiting.

pub mod error;
pub mod request;
pub mod retry;
pub mod transport;

pub use error::TransportError;
pub use request::{ApiRequest, ApiResponse, FileUpload, Method, RequestBody, endpoints};
pub use retry::{Backoff, RetryConfig, RetryPolicy, RetryTransport};
pub use transport::Transport;
