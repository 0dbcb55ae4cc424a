use chanvault_transport::RetryPolicy;
use chrono::TimeDelta;

/// Chunk size used by deployed clients (18 MiB), under the backend's
/// attachment limit.
pub const DEFAULT_CHUNK_SIZE: usize = 18 * 1024 * 1024;

/// Largest page the channel listing endpoint returns.
pub const MAX_PAGE_SIZE: usize = 100;

/// Largest number of ids accepted by one bulk deletion.
pub const MAX_BULK_BATCH: usize = 100;

/// Age limit for bulk deletion.
pub const DEFAULT_RETENTION_DAYS: i64 = 14;

/// Configuration of the retention-aware deleter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleterConfig {
    /// Messages younger than this are eligible for bulk deletion.
    pub retention_window: TimeDelta,
    /// Ids per bulk request, `2..=100`.
    pub batch_size: usize,
}

impl Default for DeleterConfig {
    fn default() -> Self {
        Self {
            retention_window: TimeDelta::days(DEFAULT_RETENTION_DAYS),
            batch_size: MAX_BULK_BATCH,
        }
    }
}

impl DeleterConfig {
    /// Set the retention window.
    #[must_use]
    pub fn with_retention_window(mut self, window: TimeDelta) -> Self {
        self.retention_window = window;
        self
    }

    /// Set the bulk batch size, clamped to what the backend accepts.
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.clamp(2, MAX_BULK_BATCH);
        self
    }
}

/// Configuration of an [`ObjectStore`](crate::ObjectStore).
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Bytes of ciphertext per blob message.
    pub chunk_size: usize,
    /// Messages requested per listing page.
    pub page_size: usize,
    /// Retry policy for the backend's overload signal.
    pub retry: RetryPolicy,
    /// Deletion settings.
    pub deleter: DeleterConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_size: MAX_PAGE_SIZE,
            retry: RetryPolicy::default(),
            deleter: DeleterConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Set the chunk size (at least one byte).
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Set the listing page size, clamped to `1..=100`.
    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the deleter configuration.
    #[must_use]
    pub fn with_deleter(mut self, deleter: DeleterConfig) -> Self {
        self.deleter = deleter;
        self
    }
}
