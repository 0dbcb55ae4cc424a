//! Portable share codes.
//!
//! A share code bundles everything needed to rebuild one file without access
//! to the channel: the passphrase, the chunk URLs in byte order and the file
//! name. It is base64 over JSON and is **not** encrypted: anyone holding the
//! code can decrypt the file.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ShareCodeError;

/// Decoded contents of a share code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareCode {
    /// Passphrase the file was encrypted with.
    #[serde(rename = "encryptionKey")]
    pub key: String,
    /// Chunk URLs; their order is the ciphertext byte order.
    #[serde(rename = "chunkUrls")]
    pub ordered_blob_urls: Vec<String>,
    /// Original file name.
    pub file_name: String,
}

impl ShareCode {
    /// Bundle a share code.
    pub fn new(
        key: impl Into<String>,
        ordered_blob_urls: Vec<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            ordered_blob_urls,
            file_name: file_name.into(),
        }
    }

    /// Encode as a portable text token.
    pub fn encode(&self) -> String {
        // Serializing strings and a string vector cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        B64.encode(json)
    }

    /// Decode a token produced by [`ShareCode::encode`].
    pub fn decode(code: &str) -> Result<Self, ShareCodeError> {
        let raw = B64
            .decode(code.trim())
            .map_err(|e| ShareCodeError::InvalidFormat(format!("not base64: {e}")))?;
        let value: Value = serde_json::from_slice(&raw)
            .map_err(|e| ShareCodeError::InvalidFormat(format!("not JSON: {e}")))?;

        let key = required_str(&value, "encryptionKey")?;
        let file_name = required_str(&value, "fileName")?;
        let urls = value
            .get("chunkUrls")
            .and_then(Value::as_array)
            .ok_or_else(|| ShareCodeError::InvalidContent("chunkUrls must be an array".into()))?;
        if urls.is_empty() {
            return Err(ShareCodeError::InvalidContent(
                "chunkUrls must not be empty".into(),
            ));
        }
        let ordered_blob_urls = urls
            .iter()
            .map(|u| {
                u.as_str().map(str::to_owned).ok_or_else(|| {
                    ShareCodeError::InvalidContent("chunkUrls must contain strings".into())
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            key,
            ordered_blob_urls,
            file_name,
        })
    }
}

fn required_str(value: &Value, field: &str) -> Result<String, ShareCodeError> {
    match value.get(field).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s.to_owned()),
        _ => Err(ShareCodeError::InvalidContent(format!(
            "{field} must be a non-empty string"
        ))),
    }
}

/// Encode `(key, ordered_blob_urls, file_name)` as a share code.
pub fn generate(key: &str, ordered_blob_urls: &[String], file_name: &str) -> String {
    ShareCode::new(key, ordered_blob_urls.to_vec(), file_name).encode()
}

/// Decode a share code.
pub fn decode(code: &str) -> Result<ShareCode, ShareCodeError> {
    ShareCode::decode(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> Vec<String> {
        vec![
            "https://cdn.example.com/a/f_chunk_0".to_owned(),
            "https://cdn.example.com/a/f_chunk_1".to_owned(),
            "https://cdn.example.com/a/f_chunk_2".to_owned(),
        ]
    }

    #[test]
    fn decode_returns_what_was_generated() {
        let code = generate("hunter2", &urls(), "holiday.mp4");
        let decoded = decode(&code).unwrap();
        assert_eq!(decoded.key, "hunter2");
        assert_eq!(decoded.ordered_blob_urls, urls());
        assert_eq!(decoded.file_name, "holiday.mp4");
    }

    #[test]
    fn uses_deployed_json_field_names() {
        let code = generate("k", &urls()[..1], "n");
        let json: Value = serde_json::from_slice(&B64.decode(code).unwrap()).unwrap();
        assert_eq!(json["encryptionKey"], "k");
        assert_eq!(json["chunkUrls"][0], "https://cdn.example.com/a/f_chunk_0");
        assert_eq!(json["fileName"], "n");
    }

    #[test]
    fn reads_codes_produced_by_other_clients() {
        let json = r#"{"encryptionKey":"pw","chunkUrls":["u0","u1"],"fileName":"a.txt"}"#;
        let decoded = decode(&B64.encode(json)).unwrap();
        assert_eq!(decoded.ordered_blob_urls, vec!["u0", "u1"]);
    }

    #[test]
    fn rejects_non_base64() {
        let err = decode("this is *not* base64!").unwrap_err();
        assert!(matches!(err, ShareCodeError::InvalidFormat(_)));
    }

    #[test]
    fn rejects_non_json() {
        let err = decode(&B64.encode("plain text")).unwrap_err();
        assert!(matches!(err, ShareCodeError::InvalidFormat(_)));
    }

    #[test]
    fn rejects_missing_file_name() {
        let json = r#"{"encryptionKey":"pw","chunkUrls":["u0"]}"#;
        let err = decode(&B64.encode(json)).unwrap_err();
        assert!(matches!(err, ShareCodeError::InvalidContent(_)));
    }

    #[test]
    fn rejects_wrong_shapes() {
        for json in [
            r#"{"encryptionKey":"","chunkUrls":["u0"],"fileName":"a"}"#,
            r#"{"encryptionKey":"pw","chunkUrls":"u0","fileName":"a"}"#,
            r#"{"encryptionKey":"pw","chunkUrls":[],"fileName":"a"}"#,
            r#"{"encryptionKey":"pw","chunkUrls":[1,2],"fileName":"a"}"#,
            r#"{"encryptionKey":7,"chunkUrls":["u0"],"fileName":"a"}"#,
            r#"[1,2,3]"#,
        ] {
            let err = decode(&B64.encode(json)).unwrap_err();
            assert!(
                matches!(err, ShareCodeError::InvalidContent(_)),
                "expected InvalidContent for {json}, got {err:?}"
            );
        }
    }
}
