use chanvault_core::{RecordError, ShareCodeError};
use chanvault_crypto::CryptoError;
use chanvault_transport::TransportError;
use thiserror::Error;

use crate::deleter::FailedDeletion;

/// Errors returned by the object store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A backend call failed.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// The backend kept answering with the overload signal until the retry
    /// budget ran out.
    #[error("backend overloaded, gave up after {attempts} attempts")]
    TransientOverload {
        /// Total attempts made.
        attempts: u32,
    },

    /// No record of the file exists in the channel.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The file's chunks are absent, incomplete, or not contiguous.
    #[error("chunks missing for file {file_id}: {detail}")]
    ChunksMissing {
        /// The affected file.
        file_id: String,
        /// What was missing.
        detail: String,
    },

    /// The ciphertext did not authenticate: wrong passphrase or corrupt data.
    #[error("decryption failed: {0}")]
    DecryptionFailure(String),

    /// Key derivation or encryption could not be set up.
    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    /// A share code could not be decoded.
    #[error("invalid share code: {0}")]
    InvalidShareCode(#[from] ShareCodeError),

    /// A record could not be rendered.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// Some of a file's records could not be deleted.
    #[error("{} record(s) could not be deleted", failed.len())]
    PartialDeleteFailure {
        /// The records that remain, with the reason each failed.
        failed: Vec<FailedDeletion>,
    },

    /// The upload source yielded a different length than declared.
    #[error("source yielded {actual} bytes, expected {expected}")]
    SourceLength {
        /// Declared size.
        expected: u64,
        /// Bytes actually read (at the point the mismatch was detected).
        actual: u64,
    },

    /// Reading the upload source or writing the download sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TransportError> for StoreError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::RetriesExhausted { attempts } => Self::TransientOverload { attempts },
            other => Self::Transport(other),
        }
    }
}

impl From<CryptoError> for StoreError {
    fn from(err: CryptoError) -> Self {
        if err.is_decryption_failure() {
            Self::DecryptionFailure(err.to_string())
        } else {
            Self::Crypto(err)
        }
    }
}
