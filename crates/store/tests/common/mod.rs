#![allow(dead_code)]

use std::sync::Arc;

use chanvault_core::{FileMetadata, chunk_filename};
use chanvault_crypto::{EncryptionKey, encrypt_stream};
use chanvault_memory::MemoryChannel;
use chanvault_store::{ObjectStore, StoreConfig};
use chanvault_transport::FileUpload;
use chrono::{DateTime, Utc};

pub const CHANNEL: &str = "1100000000000000001";
pub const PASSPHRASE: &str = "correct horse battery staple";

pub const MIB: usize = 1024 * 1024;

pub fn key() -> EncryptionKey {
    EncryptionKey::from_passphrase(PASSPHRASE).unwrap()
}

/// Deterministic, non-repeating test payload.
pub fn payload(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9E37_79B9;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state.to_le_bytes()[0]
        })
        .collect()
}

pub fn store_with(config: StoreConfig) -> (Arc<MemoryChannel>, ObjectStore) {
    let channel = Arc::new(MemoryChannel::new());
    let store = ObjectStore::new(Arc::clone(&channel), config);
    (channel, store)
}

pub fn store(chunk_size: usize) -> (Arc<MemoryChannel>, ObjectStore) {
    store_with(StoreConfig::default().with_chunk_size(chunk_size))
}

/// Write a file into the channel by hand, posting its chunks in the given
/// order. Returns the chunk message ids by chunk index.
pub fn seed_file(
    channel: &MemoryChannel,
    metadata: &FileMetadata,
    data: &[u8],
    chunk_size: usize,
    order: &[usize],
    at: DateTime<Utc>,
) -> Vec<String> {
    let ciphertext = encrypt_stream(data, &key()).unwrap();
    let chunks: Vec<&[u8]> = ciphertext.chunks(chunk_size).collect();
    assert_eq!(order.len(), chunks.len(), "order must cover every chunk");

    channel.insert(CHANNEL, at, metadata.to_content().unwrap(), None);
    let mut ids = vec![String::new(); chunks.len()];
    for &index in order {
        ids[index] = channel.insert(
            CHANNEL,
            at,
            format!("Chunk {} of {}", index + 1, chunks.len()),
            Some(FileUpload {
                filename: chunk_filename(&metadata.id, index as u64),
                data: chunks[index].to_vec().into(),
            }),
        );
    }
    ids
}

pub fn metadata(id: &str, name: &str, size: usize) -> FileMetadata {
    FileMetadata {
        id: id.into(),
        name: name.into(),
        size: size as u64,
        media_type: "application/octet-stream".into(),
    }
}
