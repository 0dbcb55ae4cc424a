use std::collections::HashSet;
use std::sync::Arc;

use chanvault_core::RemoteMessage;
use chanvault_transport::{ApiRequest, Transport, TransportError, endpoints};
use tracing::{debug, instrument, warn};

use crate::config::MAX_PAGE_SIZE;

/// Enumerates every message of a channel by walking backward through the
/// listing endpoint.
///
/// Nothing is cached: each call reflects the backend at the time of the walk.
#[derive(Clone)]
pub struct ChannelIndex {
    transport: Arc<dyn Transport>,
    page_size: usize,
}

impl ChannelIndex {
    /// Create an index reading `page_size` messages per round trip
    /// (clamped to `1..=100`).
    pub fn new(transport: Arc<dyn Transport>, page_size: usize) -> Self {
        Self {
            transport,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Every message of `channel`, newest first, deduplicated by id.
    ///
    /// Any page failure aborts the walk.
    #[instrument(skip(self))]
    pub async fn list_all(&self, channel: &str) -> Result<Vec<RemoteMessage>, TransportError> {
        let mut messages = Vec::new();
        let mut seen = HashSet::new();
        let mut before: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut request =
                ApiRequest::get(endpoints::channel_messages(channel)).query("limit", self.page_size);
            if let Some(cursor) = &before {
                request = request.query("before", cursor);
            }

            let page: Vec<RemoteMessage> = self.transport.send(request).await?.parse()?;
            pages += 1;
            let full = page.len() >= self.page_size;
            let next = page.last().map(|m| m.id.clone());

            for message in page {
                if seen.insert(message.id.clone()) {
                    messages.push(message);
                }
            }

            if !full {
                break;
            }
            if next.is_none() || next == before {
                warn!(channel, cursor = ?before, "listing cursor did not advance, stopping");
                break;
            }
            before = next;
        }

        debug!(channel, pages, count = messages.len(), "listed channel");
        Ok(messages)
    }
}
