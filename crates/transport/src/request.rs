use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransportError;

/// HTTP method of an [`ApiRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

/// A file part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// Attachment filename.
    pub filename: String,
    /// Attachment bytes.
    pub data: Bytes,
}

/// Body of an [`ApiRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// A JSON document.
    Json(Value),
    /// A message with text content and one attached file.
    Multipart {
        /// Message text content.
        content: String,
        /// The attached file.
        file: FileUpload,
    },
}

/// A call against the backend API, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path below the API base, e.g. `/channels/42/messages`.
    pub endpoint: String,
    /// Query parameters in order.
    pub query: Vec<(String, String)>,
    /// Request body.
    pub body: RequestBody,
}

impl ApiRequest {
    fn new(method: Method, endpoint: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body,
        }
    }

    /// A `GET` request.
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint, RequestBody::Empty)
    }

    /// A `DELETE` request.
    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Delete, endpoint, RequestBody::Empty)
    }

    /// A `POST` request with a JSON body.
    pub fn post_json(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, endpoint, RequestBody::Json(body))
    }

    /// A multipart `POST` carrying message content and one file.
    pub fn post_file(
        endpoint: impl Into<String>,
        content: impl Into<String>,
        filename: impl Into<String>,
        data: Bytes,
    ) -> Self {
        Self::new(
            Method::Post,
            endpoint,
            RequestBody::Multipart {
                content: content.into(),
                file: FileUpload {
                    filename: filename.into(),
                    data,
                },
            },
        )
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Value of query parameter `key`, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A successful backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code (always 2xx).
    pub status: u16,
    /// Decoded JSON body; `None` for empty bodies such as `204 No Content`.
    pub body: Option<Value>,
}

impl ApiResponse {
    /// A response with a JSON body.
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    /// A response without a body.
    pub fn empty(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Deserialize the body into `T`.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T, TransportError> {
        let body = self
            .body
            .ok_or_else(|| TransportError::Decode("expected a JSON body, got none".into()))?;
        serde_json::from_value(body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Endpoint paths of the message API.
pub mod endpoints {
    /// Messages of a channel (list and create).
    pub fn channel_messages(channel_id: &str) -> String {
        format!("/channels/{channel_id}/messages")
    }

    /// Bulk deletion endpoint of a channel.
    pub fn bulk_delete(channel_id: &str) -> String {
        format!("/channels/{channel_id}/messages/bulk-delete")
    }

    /// A single message.
    pub fn message(channel_id: &str, message_id: &str) -> String {
        format!("/channels/{channel_id}/messages/{message_id}")
    }
}
