use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;
use crate::request::{ApiRequest, ApiResponse};

/// Authenticated bridge to the remote message API.
///
/// Implementations add the caller's credential, encode the body (JSON or
/// multipart), and map every non-2xx answer to a [`TransportError`] that keeps
/// the status code and the backend's error body. HTTP 429 must surface as
/// [`TransportError::RateLimited`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one API call.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;

    /// Download raw attachment bytes from `url`.
    async fn fetch_binary(&self, url: &str) -> Result<Bytes, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        (**self).send(request).await
    }

    async fn fetch_binary(&self, url: &str) -> Result<Bytes, TransportError> {
        (**self).fetch_binary(url).await
    }
}
