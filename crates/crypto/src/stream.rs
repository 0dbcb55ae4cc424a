use std::mem;

use aes_gcm::aead::{AeadCore, OsRng};
use aes_gcm::Aes256Gcm;

use crate::{CryptoError, EncryptionKey, open, seal};

/// Stream format marker, version 1.
const MAGIC: &[u8; 4] = b"CVS1";

/// AES-GCM nonce length.
const NONCE_LEN: usize = 12;

/// Length of the stream header: magic followed by the base nonce.
pub const HEADER_LEN: usize = MAGIC.len() + NONCE_LEN;

/// AES-GCM authentication tag length appended to every window.
pub const TAG_LEN: usize = 16;

/// Plaintext bytes per window (5 MiB). Part of the stored format.
pub const WINDOW_SIZE: usize = 5 * 1024 * 1024;

/// Ciphertext bytes per full window.
const SEALED_WINDOW: usize = WINDOW_SIZE + TAG_LEN;

/// Exact ciphertext length produced for `plaintext_len` bytes of input.
pub fn ciphertext_len(plaintext_len: u64) -> u64 {
    let window = WINDOW_SIZE as u64;
    let windows = plaintext_len.div_ceil(window).max(1);
    HEADER_LEN as u64 + plaintext_len + windows * TAG_LEN as u64
}

fn window_nonce(base: &[u8; NONCE_LEN], index: u64) -> [u8; NONCE_LEN] {
    let mut nonce = *base;
    for (byte, idx) in nonce.iter_mut().zip(index.to_le_bytes()) {
        *byte ^= idx;
    }
    nonce
}

fn window_aad(index: u64, is_final: bool) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[..8].copy_from_slice(&index.to_le_bytes());
    aad[8] = u8::from(is_final);
    aad
}

/// Incremental encryptor for one file.
///
/// Feed plaintext with [`push`](Self::push) in pieces of any size and collect
/// the returned ciphertext; call [`finish`](Self::finish) once at the end.
/// At most two windows of plaintext are buffered.
pub struct StreamEncryptor {
    cipher: Aes256Gcm,
    base_nonce: [u8; NONCE_LEN],
    pending: Vec<u8>,
    next_window: u64,
    header_written: bool,
}

impl StreamEncryptor {
    /// Start a new session with a random base nonce.
    pub fn new(key: &EncryptionKey) -> Result<Self, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut base_nonce = [0u8; NONCE_LEN];
        base_nonce.copy_from_slice(nonce.as_slice());
        Ok(Self {
            cipher: key.cipher()?,
            base_nonce,
            pending: Vec::new(),
            next_window: 0,
            header_written: false,
        })
    }

    /// Encrypt more plaintext. Returns whatever ciphertext became ready,
    /// starting with the stream header on the first call.
    pub fn push(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut out = self.take_header();
        self.pending.extend_from_slice(plaintext);
        // A full window is only sealed once more data follows it, so the
        // last window can always be flagged final.
        while self.pending.len() > WINDOW_SIZE {
            let rest = self.pending.split_off(WINDOW_SIZE);
            let window = mem::replace(&mut self.pending, rest);
            out.extend(self.seal_window(&window, false)?);
        }
        Ok(out)
    }

    /// Seal the final window and end the session.
    pub fn finish(mut self) -> Result<Vec<u8>, CryptoError> {
        let mut out = self.take_header();
        let last = mem::take(&mut self.pending);
        out.extend(self.seal_window(&last, true)?);
        Ok(out)
    }

    fn take_header(&mut self) -> Vec<u8> {
        if self.header_written {
            return Vec::new();
        }
        self.header_written = true;
        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&self.base_nonce);
        header
    }

    fn seal_window(&mut self, plaintext: &[u8], is_final: bool) -> Result<Vec<u8>, CryptoError> {
        let index = self.next_window;
        self.next_window += 1;
        seal(
            &self.cipher,
            &window_nonce(&self.base_nonce, index),
            &window_aad(index, is_final),
            plaintext,
        )
    }
}

/// Incremental decryptor for one file.
///
/// Ciphertext may be pushed in pieces split at arbitrary boundaries.
pub struct StreamDecryptor {
    cipher: Aes256Gcm,
    base_nonce: Option<[u8; NONCE_LEN]>,
    pending: Vec<u8>,
    next_window: u64,
}

impl StreamDecryptor {
    /// Prepare to decrypt a stream produced under `key`.
    pub fn new(key: &EncryptionKey) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher: key.cipher()?,
            base_nonce: None,
            pending: Vec::new(),
            next_window: 0,
        })
    }

    /// Decrypt more ciphertext, returning the plaintext of every window that
    /// is known not to be the last one.
    pub fn push(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.pending.extend_from_slice(ciphertext);

        let base_nonce = match self.base_nonce {
            Some(nonce) => nonce,
            None => {
                if self.pending.len() < HEADER_LEN {
                    return Ok(Vec::new());
                }
                let nonce = parse_header(&self.pending[..HEADER_LEN])?;
                self.pending.drain(..HEADER_LEN);
                self.base_nonce = Some(nonce);
                nonce
            }
        };

        let mut out = Vec::new();
        while self.pending.len() > SEALED_WINDOW {
            let rest = self.pending.split_off(SEALED_WINDOW);
            let sealed = mem::replace(&mut self.pending, rest);
            out.extend(self.open_window(&base_nonce, &sealed, false)?);
            self.next_window += 1;
        }
        Ok(out)
    }

    /// Authenticate and decrypt the final window.
    pub fn finish(mut self) -> Result<Vec<u8>, CryptoError> {
        let Some(base_nonce) = self.base_nonce else {
            return Err(CryptoError::InvalidFormat(format!(
                "stream shorter than its {HEADER_LEN}-byte header"
            )));
        };
        let last = mem::take(&mut self.pending);
        if last.is_empty() {
            return Err(CryptoError::Truncated {
                windows: self.next_window,
            });
        }

        match self.open_window(&base_nonce, &last, true) {
            Ok(plaintext) => Ok(plaintext),
            Err(err) => {
                // A full window that authenticates as non-final means the
                // stream was cut at a window boundary.
                if last.len() == SEALED_WINDOW
                    && self.open_window(&base_nonce, &last, false).is_ok()
                {
                    Err(CryptoError::Truncated {
                        windows: self.next_window + 1,
                    })
                } else {
                    Err(err)
                }
            }
        }
    }

    fn open_window(
        &self,
        base_nonce: &[u8; NONCE_LEN],
        sealed: &[u8],
        is_final: bool,
    ) -> Result<Vec<u8>, CryptoError> {
        open(
            &self.cipher,
            &window_nonce(base_nonce, self.next_window),
            &window_aad(self.next_window, is_final),
            sealed,
        )
    }
}

fn parse_header(header: &[u8]) -> Result<[u8; NONCE_LEN], CryptoError> {
    let (magic, nonce) = header.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(CryptoError::InvalidFormat(
            "missing stream header marker".into(),
        ));
    }
    let mut base_nonce = [0u8; NONCE_LEN];
    base_nonce.copy_from_slice(nonce);
    Ok(base_nonce)
}

/// Encrypt a whole buffer as one stream.
pub fn encrypt_stream(plaintext: &[u8], key: &EncryptionKey) -> Result<Vec<u8>, CryptoError> {
    let mut encryptor = StreamEncryptor::new(key)?;
    let mut out = Vec::with_capacity(
        usize::try_from(ciphertext_len(plaintext.len() as u64)).unwrap_or_default(),
    );
    for window in plaintext.chunks(WINDOW_SIZE) {
        out.extend(encryptor.push(window)?);
    }
    out.extend(encryptor.finish()?);
    Ok(out)
}

/// Decrypt a whole stream held in memory.
pub fn decrypt_stream(ciphertext: &[u8], key: &EncryptionKey) -> Result<Vec<u8>, CryptoError> {
    let mut decryptor = StreamDecryptor::new(key)?;
    let mut out = decryptor.push(ciphertext)?;
    out.extend(decryptor.finish()?);
    Ok(out)
}
