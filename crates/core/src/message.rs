use serde::{Deserialize, Serialize};

/// A message as returned by the backend's channel message endpoints.
///
/// Only the fields the storage protocol reads are modelled; everything else
/// in the backend's payload is ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMessage {
    /// Backend-assigned snowflake identifier.
    pub id: String,
    /// Text content. Absent for attachment-only messages.
    #[serde(default)]
    pub content: String,
    /// Files attached to the message.
    #[serde(default)]
    pub attachments: Vec<RemoteAttachment>,
}

/// A file attached to a [`RemoteMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAttachment {
    /// Filename as uploaded.
    pub filename: String,
    /// Resolvable download location of the attachment bytes.
    pub url: String,
}

impl RemoteMessage {
    /// Create a text-only message.
    pub fn text(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    /// Create a message carrying one attachment.
    pub fn with_attachment(
        id: impl Into<String>,
        content: impl Into<String>,
        filename: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            attachments: vec![RemoteAttachment {
                filename: filename.into(),
                url: url.into(),
            }],
        }
    }
}
