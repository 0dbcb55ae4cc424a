use thiserror::Error;

/// Errors raised while projecting backend messages onto storage records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// A message carries the metadata prefix but its payload is not a valid
    /// metadata object.
    #[error("invalid metadata record in message {message_id}: {reason}")]
    InvalidMetadata {
        /// Backend id of the offending message.
        message_id: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Metadata could not be serialized.
    #[error("metadata serialization failed: {0}")]
    Serialization(String),
}

/// Errors raised while decoding a share code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShareCodeError {
    /// The code is not valid base64 or does not contain JSON.
    #[error("invalid share code format: {0}")]
    InvalidFormat(String),

    /// The JSON is well formed but a required field is absent, empty or of the
    /// wrong shape.
    #[error("invalid share code content: {0}")]
    InvalidContent(String),
}
