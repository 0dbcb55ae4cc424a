use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chanvault_transport::{
    ApiRequest, ApiResponse, Method, RequestBody, Transport, TransportError,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, RETRY_AFTER};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, instrument, warn};

use crate::config::DiscordConfig;
use crate::error::DiscordError;
use crate::types::{CreateMessagePayload, RateLimitBody};

/// Transport that talks to the Discord REST API as a bot.
///
/// API calls carry `Authorization: Bot <token>`. Attachment downloads go to
/// CDN URLs and are sent without the credential.
pub struct DiscordTransport {
    config: DiscordConfig,
    client: Client,
}

impl DiscordTransport {
    /// Create a new Discord transport with the given configuration.
    pub fn new(config: DiscordConfig) -> Result<Self, DiscordError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Create a new Discord transport with a custom HTTP client.
    pub fn with_client(config: DiscordConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.config.api_base)
    }

    fn build(&self, request: ApiRequest) -> Result<RequestBuilder, DiscordError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, self.url(&request.endpoint))
            .header(AUTHORIZATION, format!("Bot {}", self.config.bot_token));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart { content, file } => {
                // Discord accepts multipart/form-data with payload_json + file parts.
                let payload_json = serde_json::to_string(&CreateMessagePayload { content })
                    .map_err(|e| {
                        DiscordError::InvalidPayload(format!("failed to serialize payload: {e}"))
                    })?;
                let part = Part::bytes(file.data.to_vec())
                    .file_name(file.filename)
                    .mime_str("application/octet-stream")?;
                let form = Form::new()
                    .text("payload_json", payload_json)
                    .part("files[0]", part);
                builder.multipart(form)
            }
        };
        Ok(builder)
    }

    /// Interpret the Discord HTTP response, handling status codes and
    /// decoding the JSON body when there is one.
    async fn interpret_response(&self, response: Response) -> Result<ApiResponse, DiscordError> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = rate_limit_delay(response).await;
            warn!(?retry_after, "Discord API rate limit hit");
            return Err(DiscordError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscordError::Api {
                status: status.as_u16(),
                body,
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(ApiResponse::empty(status.as_u16()));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(ApiResponse::empty(status.as_u16()));
        }
        let body = serde_json::from_str(&text)
            .map_err(|e| DiscordError::InvalidResponse(format!("failed to parse JSON: {e}")))?;
        Ok(ApiResponse::json(status.as_u16(), body))
    }
}

/// Wait time of a 429 response: the JSON `retry_after` field, else the
/// `Retry-After` header.
async fn rate_limit_delay(response: Response) -> Option<Duration> {
    let from_header = retry_after_header(response.headers());
    let from_body = response
        .json::<RateLimitBody>()
        .await
        .ok()
        .and_then(|b| b.retry_after)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64);
    from_body.or(from_header)
}

fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    let secs: f64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

#[async_trait]
impl Transport for DiscordTransport {
    #[instrument(skip(self, request), fields(method = request.method.as_str(), endpoint = %request.endpoint))]
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        debug!("calling Discord API");
        let response = self.build(request)?.send().await.map_err(DiscordError::Http)?;
        Ok(self.interpret_response(response).await?)
    }

    #[instrument(skip(self, url))]
    async fn fetch_binary(&self, url: &str) -> Result<Bytes, TransportError> {
        debug!("fetching attachment");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(DiscordError::Http)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = rate_limit_delay(response).await;
            return Err(DiscordError::RateLimited { retry_after }.into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscordError::Api {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        Ok(response.bytes().await.map_err(DiscordError::Http)?)
    }
}
