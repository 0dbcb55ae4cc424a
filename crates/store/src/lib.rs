//! Encrypted chunked file storage on a chat channel.
//!
//! [`ObjectStore`] turns a message channel into a flat file store: each file
//! is encrypted as one stream, split into attachment-sized chunks and posted
//! as messages next to a metadata message. [`ChannelIndex`] walks the channel
//! to find them again and [`RetentionDeleter`] removes them through the
//! cheapest endpoint each message is eligible for.

pub mod config;
pub mod deleter;
pub mod error;
pub mod index;
pub mod store;

pub use config::{DEFAULT_CHUNK_SIZE, DeleterConfig, StoreConfig};
pub use deleter::{DeleteReport, FailedDeletion, RetentionDeleter};
pub use error::StoreError;
pub use index::ChannelIndex;
pub use store::{ObjectStore, ProgressFn, RestoredFile, SharedFile, TransferProgress, Upload};
