//! Streaming AES-256-GCM encryption for chanvault files.
//!
//! A file is encrypted as one continuous session: a single random base nonce
//! is written in a short header, and the plaintext is sealed in fixed-size
//! windows whose nonces are derived from the base nonce and the window index.
//! The resulting ciphertext is a plain byte stream: callers may split it at
//! any boundary for transport and decrypt the concatenation.
//!
//! ```text
//! header  = "CVS1" || base_nonce (12 bytes)
//! window  = AES-256-GCM(key, base_nonce ^ index, plaintext <= 5 MiB,
//!                       aad = index (u64 LE) || final flag)
//! stream  = header || window_0 || ... || window_last
//! ```
//!
//! The final-window flag in the associated data makes truncation at a window
//! boundary detectable.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub mod stream;

// Re-export for consumers so they don't need a direct `secrecy` dependency.
pub use secrecy::{ExposeSecret, Secret, SecretString};
pub use stream::{
    HEADER_LEN, StreamDecryptor, StreamEncryptor, TAG_LEN, WINDOW_SIZE, ciphertext_len,
    decrypt_stream, encrypt_stream,
};

/// A 32-byte AES-256 key that is zeroized when dropped.
///
/// The [`Debug`] implementation is redacted to avoid accidental logging.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Build the key for a user passphrase.
    ///
    /// The passphrase is used directly as key material: its SHA-256 digest is
    /// the AES key. No stretching is applied, so files stored by earlier
    /// clients stay readable.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, CryptoError> {
        if passphrase.is_empty() {
            return Err(CryptoError::InvalidKey("passphrase must not be empty".into()));
        }
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Ok(Self(key))
    }

    pub(crate) fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid AES key: {e}")))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// Errors that can occur during encryption/decryption operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The key or passphrase is unusable.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The ciphertext does not start with a valid stream header.
    #[error("invalid ciphertext: {0}")]
    InvalidFormat(String),

    /// Decryption failed: wrong key or corrupted data.
    #[error("decryption failed (wrong key or corrupted data)")]
    DecryptionFailed,

    /// The ciphertext ends before its final window.
    #[error("ciphertext truncated after window {windows}")]
    Truncated {
        /// Number of windows that authenticated.
        windows: u64,
    },

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}

impl CryptoError {
    /// Returns `true` when the error means the ciphertext could not be
    /// authenticated or parsed, as opposed to a local key/setup problem.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat(_) | Self::DecryptionFailed | Self::Truncated { .. }
        )
    }
}

/// Seal one window.
pub(crate) fn seal(
    cipher: &Aes256Gcm,
    nonce: &[u8; 12],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

/// Open one window; any failure is reported as [`CryptoError::DecryptionFailed`].
pub(crate) fn open(
    cipher: &Aes256Gcm,
    nonce: &[u8; 12],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passphrase_key_is_sha256_of_passphrase() {
        let key = EncryptionKey::from_passphrase("correct horse").unwrap();
        assert_eq!(
            hex::encode(key.0),
            hex::encode(Sha256::digest(b"correct horse"))
        );
    }

    #[test]
    fn empty_passphrase_rejected() {
        let err = EncryptionKey::from_passphrase("").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey(_)));
        assert!(!err.is_decryption_failure());
    }

    #[test]
    fn debug_redacts_key() {
        let key = EncryptionKey::from_passphrase("secret").unwrap();
        let debug = format!("{key:?}");
        assert_eq!(debug, "EncryptionKey([REDACTED])");
    }

    #[test]
    fn decryption_failures_are_classified() {
        assert!(CryptoError::DecryptionFailed.is_decryption_failure());
        assert!(CryptoError::Truncated { windows: 1 }.is_decryption_failure());
        assert!(CryptoError::InvalidFormat("x".into()).is_decryption_failure());
        assert!(!CryptoError::EncryptionFailed("x".into()).is_decryption_failure());
    }
}
