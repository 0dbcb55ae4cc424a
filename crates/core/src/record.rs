//! Projections of backend messages onto file and blob records.
//!
//! A file is stored as one metadata message followed by one message per
//! ciphertext chunk:
//!
//! - metadata: content `metadata:{"id":..,"name":..,"size":..,"type":..}`
//! - chunk: a single attachment named `{file_id}_chunk_{index}`
//!
//! Both shapes are read by previously deployed clients and must not change.

use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::message::RemoteMessage;

/// Prefix marking a message whose content is a [`FileMetadata`] payload.
pub const METADATA_PREFIX: &str = "metadata:";

/// Separator between the file id and the sequence index in chunk filenames.
const CHUNK_MARKER: &str = "_chunk_";

/// Logical description of a stored file (the `FileRecord`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// File id shared by every chunk of the file.
    pub id: String,
    /// Original file name.
    pub name: String,
    /// Plaintext size in bytes.
    pub size: u64,
    /// Media type reported at upload time; may be empty.
    #[serde(rename = "type", default)]
    pub media_type: String,
}

impl FileMetadata {
    /// Render the message content that announces this file.
    pub fn to_content(&self) -> Result<String, RecordError> {
        let json =
            serde_json::to_string(self).map_err(|e| RecordError::Serialization(e.to_string()))?;
        Ok(format!("{METADATA_PREFIX}{json}"))
    }

    /// Parse a metadata message.
    ///
    /// Returns `None` when the message does not carry the metadata prefix, and
    /// `Some(Err(_))` when it does but the payload is malformed.
    pub fn from_message(message: &RemoteMessage) -> Option<Result<Self, RecordError>> {
        let payload = message.content.strip_prefix(METADATA_PREFIX)?;
        Some(
            serde_json::from_str(payload).map_err(|e| RecordError::InvalidMetadata {
                message_id: message.id.clone(),
                reason: e.to_string(),
            }),
        )
    }
}

/// Filename of the attachment carrying chunk `index` of `file_id`.
pub fn chunk_filename(file_id: &str, index: u64) -> String {
    format!("{file_id}{CHUNK_MARKER}{index}")
}

/// Sequence index encoded in `filename`, if it names a chunk of `file_id`.
///
/// Only the canonical decimal form written by [`chunk_filename`] matches.
pub fn chunk_index(filename: &str, file_id: &str) -> Option<u64> {
    let digits = filename.strip_prefix(file_id)?.strip_prefix(CHUNK_MARKER)?;
    let index: u64 = digits.parse().ok()?;
    (index.to_string() == digits).then_some(index)
}

/// One ciphertext chunk of a stored file (the `BlobRecord`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    /// Backend id of the message carrying the chunk.
    pub message_id: String,
    /// Position of the chunk within the file's ciphertext.
    pub index: u64,
    /// Location of the attachment bytes.
    pub url: String,
}

impl BlobRecord {
    /// Project `message` onto a chunk of `file_id`.
    ///
    /// Only the first attachment is considered; chunk messages carry exactly
    /// one.
    pub fn from_message(message: &RemoteMessage, file_id: &str) -> Option<Self> {
        let attachment = message.attachments.first()?;
        let index = chunk_index(&attachment.filename, file_id)?;
        Some(Self {
            message_id: message.id.clone(),
            index,
            url: attachment.url.clone(),
        })
    }
}

/// Collect every chunk of `file_id` in `messages`, in the order encountered.
pub fn blob_records(messages: &[RemoteMessage], file_id: &str) -> Vec<BlobRecord> {
    messages
        .iter()
        .filter_map(|m| BlobRecord::from_message(m, file_id))
        .collect()
}

/// Summary returned when listing a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    /// File id.
    pub id: String,
    /// Original file name.
    pub name: String,
    /// Plaintext size in bytes.
    pub size: u64,
    /// Media type reported at upload time.
    pub media_type: String,
    /// Number of chunk messages found for the file.
    pub chunk_count: usize,
}

impl FileSummary {
    /// Build a summary from metadata and the number of chunks observed.
    pub fn new(metadata: FileMetadata, chunk_count: usize) -> Self {
        Self {
            id: metadata.id,
            name: metadata.name,
            size: metadata.size,
            media_type: metadata.media_type,
            chunk_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileMetadata {
        FileMetadata {
            id: "lq3k2abcde".into(),
            name: "report.pdf".into(),
            size: 1234,
            media_type: "application/pdf".into(),
        }
    }

    #[test]
    fn metadata_content_matches_wire_format() {
        let content = sample().to_content().unwrap();
        assert_eq!(
            content,
            r#"metadata:{"id":"lq3k2abcde","name":"report.pdf","size":1234,"type":"application/pdf"}"#
        );
    }

    #[test]
    fn metadata_parses_from_message() {
        let msg = RemoteMessage::text("1", sample().to_content().unwrap());
        let parsed = FileMetadata::from_message(&msg).unwrap().unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn non_metadata_message_is_ignored() {
        let msg = RemoteMessage::text("1", "Chunk 1 of 3");
        assert!(FileMetadata::from_message(&msg).is_none());
    }

    #[test]
    fn malformed_metadata_is_reported() {
        let msg = RemoteMessage::text("55", "metadata:{not json");
        let err = FileMetadata::from_message(&msg).unwrap().unwrap_err();
        assert!(matches!(err, RecordError::InvalidMetadata { ref message_id, .. } if message_id == "55"));
    }

    #[test]
    fn metadata_without_type_defaults_to_empty() {
        let msg = RemoteMessage::text("1", r#"metadata:{"id":"a","name":"b","size":0}"#);
        let parsed = FileMetadata::from_message(&msg).unwrap().unwrap();
        assert!(parsed.media_type.is_empty());
    }

    #[test]
    fn chunk_filename_and_index() {
        assert_eq!(chunk_filename("abc", 7), "abc_chunk_7");
        assert_eq!(chunk_index("abc_chunk_7", "abc"), Some(7));
        assert_eq!(chunk_index("abc_chunk_12", "abc"), Some(12));
        assert_eq!(chunk_index("abc_chunk_x", "abc"), None);
        assert_eq!(chunk_index("abcd_chunk_1", "abc"), None);
        assert_eq!(chunk_index("other_chunk_1", "abc"), None);
        assert_eq!(chunk_index("abc_chunk_0", "abc"), Some(0));
    }

    #[test]
    fn chunk_index_rejects_non_canonical_numbers() {
        assert_eq!(chunk_index("abc_chunk_+1", "abc"), None);
        assert_eq!(chunk_index("abc_chunk_01", "abc"), None);
        assert_eq!(chunk_index("abc_chunk_", "abc"), None);
        assert_eq!(chunk_index("abc_chunk_ 1", "abc"), None);
    }

    #[test]
    fn blob_records_skip_unrelated_messages() {
        let messages = vec![
            RemoteMessage::with_attachment("3", "Chunk 2 of 2", "f1_chunk_1", "u1"),
            RemoteMessage::with_attachment("2", "Chunk 1 of 1", "f2_chunk_0", "u2"),
            RemoteMessage::text("1", "hello"),
            RemoteMessage::with_attachment("0", "Chunk 1 of 2", "f1_chunk_0", "u0"),
        ];
        let blobs = blob_records(&messages, "f1");
        let indices: Vec<u64> = blobs.iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![1, 0]);
        assert_eq!(blobs[1].url, "u0");
        assert_eq!(blobs[1].message_id, "0");
    }
}
