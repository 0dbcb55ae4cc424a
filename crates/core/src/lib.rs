//! Core records of the chanvault storage protocol.
//!
//! Everything in this crate is pure: projections of backend messages onto
//! file and chunk records, snowflake decoding, file id generation and the
//! share-code codec.

pub mod error;
pub mod id;
pub mod message;
pub mod record;
pub mod share;
pub mod snowflake;

pub use error::{RecordError, ShareCodeError};
pub use id::generate_file_id;
pub use message::{RemoteAttachment, RemoteMessage};
pub use record::{
    BlobRecord, FileMetadata, FileSummary, METADATA_PREFIX, blob_records, chunk_filename,
    chunk_index,
};
pub use share::ShareCode;
