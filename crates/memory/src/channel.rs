use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chanvault_core::snowflake;
use chanvault_core::{RemoteAttachment, RemoteMessage};
use chanvault_transport::{
    ApiRequest, ApiResponse, FileUpload, RequestBody, Transport, TransportError,
};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde_json::{Value, json};
use tracing::debug;

use crate::route::Route;

/// Default page size of the list endpoint when `limit` is absent.
const DEFAULT_PAGE_LIMIT: usize = 50;
/// Largest page the list endpoint returns.
const MAX_PAGE_LIMIT: usize = 100;
/// Bounds on the number of ids in one bulk deletion.
const BULK_MIN: usize = 2;
const BULK_MAX: usize = 100;
/// Messages older than this cannot be bulk deleted.
const BULK_MAX_AGE_DAYS: i64 = 14;

/// A call observed by a [`MemoryChannel`], recorded in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// One page of the channel listing.
    ListPage {
        channel: String,
        before: Option<String>,
        limit: usize,
    },
    /// A message creation.
    Create { channel: String },
    /// A bulk deletion attempt with the ids it carried.
    BulkDelete { channel: String, ids: Vec<String> },
    /// A single-message deletion attempt.
    Delete { channel: String, id: String },
    /// An attachment download.
    Fetch { url: String },
}

/// Failure injection and call log.
#[derive(Debug, Default)]
struct Hooks {
    fail_bulk: bool,
    failing_deletes: HashSet<String>,
    rate_limits: VecDeque<Option<Duration>>,
    calls: Vec<Call>,
}

/// In-memory [`Transport`] that behaves like the message API of a chat
/// channel.
///
/// Messages are kept per channel, keyed by snowflake id, and listed
/// newest-first. Attachments are served from `memory://` URLs. Bulk deletion
/// enforces the backend's rules: between 2 and 100 ids, none older than 14
/// days.
///
/// Tests can backdate messages, inject failures, and inspect every call made.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    channels: DashMap<String, BTreeMap<u64, RemoteMessage>>,
    attachments: DashMap<String, Bytes>,
    last_id: Mutex<u64>,
    hooks: Mutex<Hooks>,
}

impl MemoryChannel {
    /// Create a new, empty channel backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn hooks(&self) -> MutexGuard<'_, Hooks> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: Call) {
        self.hooks().calls.push(call);
    }

    /// Allocate an id for a message created at `at`. Ids are unique; ids of
    /// live posts are strictly increasing.
    fn next_id(&self, at: DateTime<Utc>, live: bool) -> u64 {
        let ms = u64::try_from(at.timestamp_millis()).unwrap_or(0);
        let mut last = self.last_id.lock().unwrap_or_else(PoisonError::into_inner);
        let mut id = snowflake::compose(ms, 0);
        if live {
            id = id.max(*last + 1);
        }
        while self.id_taken(id) {
            id += 1;
        }
        *last = (*last).max(id);
        id
    }

    fn id_taken(&self, id: u64) -> bool {
        self.channels.iter().any(|c| c.value().contains_key(&id))
    }

    fn store(
        &self,
        channel: &str,
        at: DateTime<Utc>,
        content: String,
        file: Option<FileUpload>,
        live: bool,
    ) -> RemoteMessage {
        let id = self.next_id(at, live);
        let attachments = file
            .map(|file| {
                let url = format!("memory://attachments/{channel}/{id}/{}", file.filename);
                self.attachments.insert(url.clone(), file.data);
                vec![RemoteAttachment {
                    filename: file.filename,
                    url,
                }]
            })
            .unwrap_or_default();

        let message = RemoteMessage {
            id: id.to_string(),
            content,
            attachments,
        };
        self.channels
            .entry(channel.to_owned())
            .or_default()
            .insert(id, message.clone());
        message
    }

    /// Insert a message as if it had been posted at `at`, bypassing the API.
    /// Returns the new message id.
    pub fn insert(
        &self,
        channel: &str,
        at: DateTime<Utc>,
        content: impl Into<String>,
        file: Option<FileUpload>,
    ) -> String {
        self.store(channel, at, content.into(), file, false).id
    }

    /// All messages of `channel`, newest first.
    pub fn messages(&self, channel: &str) -> Vec<RemoteMessage> {
        self.channels
            .get(channel)
            .map(|msgs| msgs.values().rev().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of messages in `channel`.
    pub fn message_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, |msgs| msgs.len())
    }

    /// Remove a message without going through the API (and without
    /// recording a call).
    pub fn remove_message(&self, channel: &str, id: &str) -> bool {
        let Ok(key) = id.parse::<u64>() else {
            return false;
        };
        self.channels
            .get_mut(channel)
            .and_then(|mut msgs| msgs.remove(&key))
            .is_some()
    }

    /// Replace the bytes served at an attachment URL.
    pub fn replace_attachment(&self, url: &str, data: Bytes) {
        self.attachments.insert(url.to_owned(), data);
    }

    /// Make every subsequent bulk deletion fail with HTTP 500.
    pub fn fail_bulk_deletes(&self, fail: bool) {
        self.hooks().fail_bulk = fail;
    }

    /// Make single deletions of message `id` fail with HTTP 403.
    pub fn fail_deletes_for(&self, id: impl Into<String>) {
        self.hooks().failing_deletes.insert(id.into());
    }

    /// Answer the next call with HTTP 429, carrying `retry_after` as the
    /// backend's wait hint. Queued answers are consumed one per call.
    pub fn rate_limit_next(&self, retry_after: Option<Duration>) {
        self.hooks().rate_limits.push_back(retry_after);
    }

    /// Every call observed so far.
    pub fn calls(&self) -> Vec<Call> {
        self.hooks().calls.clone()
    }

    /// Id batches of every bulk deletion attempt.
    pub fn bulk_delete_batches(&self) -> Vec<Vec<String>> {
        self.hooks()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::BulkDelete { ids, .. } => Some(ids.clone()),
                _ => None,
            })
            .collect()
    }

    /// Ids of every single-message deletion attempt.
    pub fn single_deletes(&self) -> Vec<String> {
        self.hooks()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Delete { id, .. } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of list pages requested.
    pub fn page_requests(&self) -> usize {
        self.hooks()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::ListPage { .. }))
            .count()
    }

    /// Forget the call log.
    pub fn clear_calls(&self) {
        self.hooks().calls.clear();
    }

    fn take_rate_limit(&self) -> Option<TransportError> {
        self.hooks()
            .rate_limits
            .pop_front()
            .map(|retry_after| TransportError::RateLimited { retry_after })
    }

    fn list(&self, channel: &str, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let limit = match request.query_value("limit") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|l| (1..=MAX_PAGE_LIMIT).contains(l))
                .ok_or_else(|| bad_request(50035, "Invalid Form Body: limit"))?,
            None => DEFAULT_PAGE_LIMIT,
        };
        let before = request.query_value("before").map(str::to_owned);
        let bound = match &before {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|_| bad_request(50035, "Invalid Form Body: before"))?,
            ),
            None => None,
        };

        self.record(Call::ListPage {
            channel: channel.to_owned(),
            before,
            limit,
        });

        let page: Vec<RemoteMessage> = self
            .channels
            .get(channel)
            .map(|msgs| {
                let range = match bound {
                    Some(b) => msgs.range(..b),
                    None => msgs.range(..),
                };
                range.rev().take(limit).map(|(_, m)| m.clone()).collect()
            })
            .unwrap_or_default();

        let body = serde_json::to_value(page).map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(ApiResponse::json(200, body))
    }

    fn create(&self, channel: &str, body: RequestBody) -> Result<ApiResponse, TransportError> {
        self.record(Call::Create {
            channel: channel.to_owned(),
        });

        let (content, file) = match body {
            RequestBody::Json(value) => {
                let content = value
                    .get("content")
                    .and_then(Value::as_str)
                    .ok_or_else(|| bad_request(50006, "Cannot send an empty message"))?
                    .to_owned();
                (content, None)
            }
            RequestBody::Multipart { content, file } => (content, Some(file)),
            RequestBody::Empty => return Err(bad_request(50006, "Cannot send an empty message")),
        };

        let message = self.store(channel, Utc::now(), content, file, true);
        let body =
            serde_json::to_value(&message).map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(ApiResponse::json(200, body))
    }

    fn bulk_delete(&self, channel: &str, body: &RequestBody) -> Result<ApiResponse, TransportError> {
        let ids: Vec<String> = match body {
            RequestBody::Json(value) => value
                .get("messages")
                .and_then(Value::as_array)
                .map(|ids| {
                    ids.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        self.record(Call::BulkDelete {
            channel: channel.to_owned(),
            ids: ids.clone(),
        });

        if self.hooks().fail_bulk {
            return Err(TransportError::Status {
                status: 500,
                body: r#"{"message":"Internal Server Error","code":0}"#.into(),
            });
        }
        if !(BULK_MIN..=BULK_MAX).contains(&ids.len()) {
            return Err(bad_request(50035, "Invalid Form Body: messages"));
        }
        let now = Utc::now();
        if ids
            .iter()
            .any(|id| !snowflake::is_recent(id, TimeDelta::days(BULK_MAX_AGE_DAYS), now))
        {
            return Err(bad_request(
                50034,
                "You can only bulk delete messages that are under 14 days old.",
            ));
        }

        if let Some(mut msgs) = self.channels.get_mut(channel) {
            for id in &ids {
                if let Ok(key) = id.parse::<u64>() {
                    msgs.remove(&key);
                }
            }
        }
        debug!(channel, count = ids.len(), "bulk deleted messages");
        Ok(ApiResponse::empty(204))
    }

    fn delete(&self, channel: &str, id: &str) -> Result<ApiResponse, TransportError> {
        self.record(Call::Delete {
            channel: channel.to_owned(),
            id: id.to_owned(),
        });

        if self.hooks().failing_deletes.contains(id) {
            return Err(TransportError::Status {
                status: 403,
                body: r#"{"message":"Missing Permissions","code":50013}"#.into(),
            });
        }

        if self.remove_message(channel, id) {
            Ok(ApiResponse::empty(204))
        } else {
            Err(TransportError::Status {
                status: 404,
                body: r#"{"message":"Unknown Message","code":10008}"#.into(),
            })
        }
    }
}

fn bad_request(code: u32, message: &str) -> TransportError {
    TransportError::Status {
        status: 400,
        body: json!({ "message": message, "code": code }).to_string(),
    }
}

#[async_trait]
impl Transport for MemoryChannel {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        if let Some(err) = self.take_rate_limit() {
            return Err(err);
        }

        let Some(route) = Route::parse(request.method, &request.endpoint) else {
            return Err(TransportError::Status {
                status: 404,
                body: r#"{"message":"404: Not Found","code":0}"#.into(),
            });
        };

        match route {
            Route::List { channel } => self.list(channel, &request),
            Route::Create { channel } => {
                let channel = channel.to_owned();
                self.create(&channel, request.body)
            }
            Route::BulkDelete { channel } => self.bulk_delete(channel, &request.body),
            Route::Delete { channel, message } => self.delete(channel, message),
        }
    }

    async fn fetch_binary(&self, url: &str) -> Result<Bytes, TransportError> {
        if let Some(err) = self.take_rate_limit() {
            return Err(err);
        }
        self.record(Call::Fetch {
            url: url.to_owned(),
        });

        self.attachments
            .get(url)
            .map(|data| data.value().clone())
            .ok_or_else(|| TransportError::Status {
                status: 404,
                body: String::new(),
            })
    }
}
