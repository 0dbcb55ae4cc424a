use std::collections::HashSet;
use std::sync::Arc;

use chanvault_core::snowflake;
use chanvault_transport::{ApiRequest, Transport, TransportError, endpoints};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::config::{DeleterConfig, MAX_BULK_BATCH};
use crate::error::StoreError;

/// A record that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDeletion {
    /// Message id of the record.
    pub id: String,
    /// Why the last attempt failed.
    pub error: String,
}

/// Outcome of a deletion. Every requested id appears in exactly one list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    /// Ids removed through the bulk endpoint.
    pub bulk_deleted: Vec<String>,
    /// Ids removed one at a time.
    pub individually_deleted: Vec<String>,
    /// Ids that remain, with the reason.
    pub failed: Vec<FailedDeletion>,
}

impl DeleteReport {
    /// Number of ids removed.
    pub fn deleted(&self) -> usize {
        self.bulk_deleted.len() + self.individually_deleted.len()
    }

    /// Number of ids accounted for.
    pub fn total(&self) -> usize {
        self.deleted() + self.failed.len()
    }

    /// Returns `true` if nothing failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Ids that still need deleting.
    pub fn failed_ids(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.id.clone()).collect()
    }

    /// Turn a report with failures into [`StoreError::PartialDeleteFailure`].
    pub fn into_result(self) -> Result<Self, StoreError> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(StoreError::PartialDeleteFailure {
                failed: self.failed,
            })
        }
    }
}

/// Deletes messages through the cheapest endpoint each one is eligible for.
///
/// Messages younger than the retention window go through the bulk endpoint
/// in batches; when a batch is rejected, each of its ids is retried alone.
/// Older messages are always deleted one by one.
#[derive(Clone)]
pub struct RetentionDeleter {
    transport: Arc<dyn Transport>,
    config: DeleterConfig,
}

impl RetentionDeleter {
    /// Create a deleter.
    ///
    /// The batch size is held to what the bulk endpoint accepts, however the
    /// config was built.
    pub fn new(transport: Arc<dyn Transport>, mut config: DeleterConfig) -> Self {
        config.batch_size = config.batch_size.clamp(2, MAX_BULK_BATCH);
        Self { transport, config }
    }

    /// Delete `ids` from `channel`, judging age against the current time.
    pub async fn delete(&self, channel: &str, ids: &[String]) -> DeleteReport {
        self.delete_at(channel, ids, Utc::now()).await
    }

    /// Delete `ids` from `channel`, judging age against `now`.
    ///
    /// Never fails as a whole: per-id failures are collected in the report.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete_at(
        &self,
        channel: &str,
        ids: &[String],
        now: DateTime<Utc>,
    ) -> DeleteReport {
        let mut seen = HashSet::new();
        let (recent, old): (Vec<String>, Vec<String>) = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .partition(|id| snowflake::is_recent(id, self.config.retention_window, now));
        debug!(recent = recent.len(), old = old.len(), "partitioned ids by age");

        let mut report = DeleteReport::default();

        for batch in recent.chunks(self.config.batch_size) {
            if batch.len() < 2 {
                self.delete_each(channel, batch, &mut report).await;
                continue;
            }
            match self.bulk_delete(channel, batch).await {
                Ok(()) => report.bulk_deleted.extend_from_slice(batch),
                Err(e) => {
                    warn!(
                        channel,
                        size = batch.len(),
                        error = %e,
                        "bulk delete failed, deleting individually"
                    );
                    self.delete_each(channel, batch, &mut report).await;
                }
            }
        }

        self.delete_each(channel, &old, &mut report).await;

        info!(
            channel,
            bulk = report.bulk_deleted.len(),
            individual = report.individually_deleted.len(),
            failed = report.failed.len(),
            "deletion finished"
        );
        report
    }

    async fn bulk_delete(&self, channel: &str, batch: &[String]) -> Result<(), TransportError> {
        let request =
            ApiRequest::post_json(endpoints::bulk_delete(channel), json!({ "messages": batch }));
        self.transport.send(request).await.map(|_| ())
    }

    async fn delete_each(&self, channel: &str, ids: &[String], report: &mut DeleteReport) {
        for id in ids {
            let request = ApiRequest::delete(endpoints::message(channel, id));
            match self.transport.send(request).await {
                Ok(_) => report.individually_deleted.push(id.clone()),
                Err(TransportError::Status { status: 404, .. }) => {
                    debug!(channel, id = %id, "message already gone");
                    report.individually_deleted.push(id.clone());
                }
                Err(e) => {
                    warn!(channel, id = %id, error = %e, "failed to delete message");
                    report.failed.push(FailedDeletion {
                        id: id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}
