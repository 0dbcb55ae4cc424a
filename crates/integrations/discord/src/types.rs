use serde::{Deserialize, Serialize};

/// `payload_json` part of a message-create multipart request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateMessagePayload {
    /// Message text content.
    pub content: String,
}

/// Body of an HTTP 429 response.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitBody {
    /// Seconds to wait before retrying.
    pub retry_after: Option<f64>,
    /// Whether the limit is global to the bot.
    #[serde(default)]
    pub global: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_message_payload_serializes() {
        let payload = CreateMessagePayload {
            content: "Chunk 1 of 3".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"content": "Chunk 1 of 3"}));
    }

    #[test]
    fn rate_limit_body_deserializes() {
        let json = r#"{"message":"You are being rate limited.","retry_after":0.642,"global":false}"#;
        let body: RateLimitBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.retry_after, Some(0.642));
        assert!(!body.global);
    }
}
