use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bytes::Bytes;
use chanvault_core::share::{self, ShareCode};
use chanvault_core::{
    BlobRecord, FileMetadata, FileSummary, RemoteMessage, blob_records, chunk_filename,
    generate_file_id,
};
use chanvault_crypto::{EncryptionKey, StreamDecryptor, StreamEncryptor, ciphertext_len};
use chanvault_transport::{ApiRequest, RetryTransport, Transport, endpoints};
use serde_json::json;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

use crate::config::StoreConfig;
use crate::deleter::{DeleteReport, RetentionDeleter};
use crate::error::StoreError;
use crate::index::ChannelIndex;

/// Read buffer size for upload sources.
const READ_BUF: usize = 64 * 1024;

/// Chunk progress of an upload or download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Chunks transferred so far.
    pub completed: u64,
    /// Chunks in the file.
    pub total: u64,
}

/// Callback invoked after each chunk is transferred.
pub type ProgressFn = dyn Fn(TransferProgress) + Send + Sync;

/// A file to upload: a byte source with its declared length and name.
pub struct Upload<R> {
    reader: R,
    size: u64,
    name: String,
    media_type: String,
}

impl<R: AsyncRead + Unpin + Send> Upload<R> {
    /// Upload `size` bytes from `reader` under `name`.
    pub fn new(reader: R, size: u64, name: impl Into<String>) -> Self {
        Self {
            reader,
            size,
            name: name.into(),
            media_type: String::new(),
        }
    }

    /// Set the media type recorded in the file's metadata.
    #[must_use]
    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }
}

/// A file reconstructed from a share code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFile {
    /// Name carried by the share code.
    pub name: String,
    /// Plaintext bytes.
    pub data: Vec<u8>,
}

/// A file downloaded through [`ObjectStore::get_into`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredFile {
    /// Name recorded in the file's metadata.
    pub name: String,
    /// Plaintext bytes written.
    pub bytes: u64,
}

/// Encrypted chunked file storage on a message channel.
///
/// Every file is one metadata message plus one message per ciphertext chunk.
/// The channel itself is the only index: listing, reading, sharing and
/// deleting all start from a fresh walk of the channel.
///
/// The store is `Send + Sync` and cheap to clone; operations on different
/// files may run concurrently.
#[derive(Clone)]
pub struct ObjectStore {
    transport: Arc<dyn Transport>,
    index: ChannelIndex,
    deleter: RetentionDeleter,
    chunk_size: usize,
}

impl ObjectStore {
    /// Create a store over `transport`. Backend calls are retried on the
    /// overload signal according to `config.retry`.
    pub fn new<T: Transport + 'static>(transport: T, config: StoreConfig) -> Self {
        let transport: Arc<dyn Transport> =
            Arc::new(RetryTransport::new(transport, config.retry.clone()));
        Self {
            index: ChannelIndex::new(Arc::clone(&transport), config.page_size),
            deleter: RetentionDeleter::new(Arc::clone(&transport), config.deleter),
            transport,
            chunk_size: config.chunk_size.max(1),
        }
    }

    /// Channel index used by this store.
    pub fn index(&self) -> &ChannelIndex {
        &self.index
    }

    /// Deleter used by this store.
    pub fn deleter(&self) -> &RetentionDeleter {
        &self.deleter
    }

    /// Encrypt and upload a file, returning its new id.
    ///
    /// The metadata message is posted first, then the chunks strictly in
    /// order. If the source yields a different length than declared the
    /// upload stops with [`StoreError::SourceLength`]; records already posted
    /// remain as an incomplete file.
    #[instrument(skip_all, fields(channel = %channel, name = %upload.name, size = upload.size))]
    pub async fn put<R>(
        &self,
        channel: &str,
        upload: Upload<R>,
        key: &EncryptionKey,
        progress: Option<&ProgressFn>,
    ) -> Result<String, StoreError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let Upload {
            mut reader,
            size,
            name,
            media_type,
        } = upload;

        let mut encryptor = StreamEncryptor::new(key)?;
        let chunk_size = self.chunk_size as u64;
        let total = ciphertext_len(size).div_ceil(chunk_size);

        let metadata = FileMetadata {
            id: generate_file_id(),
            name,
            size,
            media_type,
        };
        let content = metadata.to_content()?;
        self.transport
            .send(ApiRequest::post_json(
                endpoints::channel_messages(channel),
                json!({ "content": content }),
            ))
            .await?;
        debug!(file_id = %metadata.id, chunks = total, "posted metadata");

        let mut sender = ChunkSender {
            store: self,
            channel,
            file_id: &metadata.id,
            total,
            next: 0,
            progress,
        };
        let mut pending: Vec<u8> = Vec::with_capacity(self.chunk_size);
        let mut buf = vec![0u8; READ_BUF];
        let mut read: u64 = 0;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            read += n as u64;
            if read > size {
                return Err(StoreError::SourceLength {
                    expected: size,
                    actual: read,
                });
            }
            pending.extend_from_slice(&encryptor.push(&buf[..n])?);
            while pending.len() >= self.chunk_size {
                let rest = pending.split_off(self.chunk_size);
                sender.send(std::mem::replace(&mut pending, rest)).await?;
            }
        }
        if read != size {
            return Err(StoreError::SourceLength {
                expected: size,
                actual: read,
            });
        }

        pending.extend_from_slice(&encryptor.finish()?);
        while !pending.is_empty() {
            let take = pending.len().min(self.chunk_size);
            let rest = pending.split_off(take);
            sender.send(std::mem::replace(&mut pending, rest)).await?;
        }

        info!(file_id = %metadata.id, chunks = sender.next, "file stored");
        Ok(metadata.id)
    }

    /// Encrypt and upload an in-memory file.
    pub async fn put_bytes(
        &self,
        channel: &str,
        name: &str,
        media_type: &str,
        data: &[u8],
        key: &EncryptionKey,
    ) -> Result<String, StoreError> {
        let upload = Upload::new(data, data.len() as u64, name).media_type(media_type);
        self.put(channel, upload, key, None).await
    }

    /// Summaries of every file in `channel`, newest first.
    ///
    /// Files without any chunk are listed with `chunk_count == 0`; metadata
    /// messages that do not parse are skipped. `chunk_count` counts distinct
    /// chunk indices, so duplicated chunks are counted once.
    #[instrument(skip(self))]
    pub async fn list(&self, channel: &str) -> Result<Vec<FileSummary>, StoreError> {
        let messages = self.index.list_all(channel).await?;
        let summaries: Vec<FileSummary> = metadata_records(&messages)
            .map(|(_, metadata)| {
                let chunks = blob_records(&messages, &metadata.id)
                    .into_iter()
                    .map(|b| b.index)
                    .collect::<BTreeSet<_>>()
                    .len();
                FileSummary::new(metadata, chunks)
            })
            .collect();
        debug!(files = summaries.len(), "listed files");
        Ok(summaries)
    }

    /// Download and decrypt a file into `writer`, returning its stored name
    /// and the number of plaintext bytes written.
    #[instrument(skip(self, key, writer, progress))]
    pub async fn get_into<W>(
        &self,
        channel: &str,
        file_id: &str,
        key: &EncryptionKey,
        writer: &mut W,
        progress: Option<&ProgressFn>,
    ) -> Result<RestoredFile, StoreError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let messages = self.index.list_all(channel).await?;
        let metadata = find_metadata(&messages, file_id)?;
        let urls = ordered_urls(&messages, file_id)?;

        let written = self
            .restore(
                file_id,
                &urls,
                Some(ciphertext_len(metadata.size)),
                key,
                writer,
                progress,
            )
            .await?;
        info!(file_id, bytes = written, "file restored");
        Ok(RestoredFile {
            name: metadata.name,
            bytes: written,
        })
    }

    /// Download and decrypt a file.
    pub async fn get(
        &self,
        channel: &str,
        file_id: &str,
        key: &EncryptionKey,
    ) -> Result<Vec<u8>, StoreError> {
        let mut out = Vec::new();
        self.get_into(channel, file_id, key, &mut out, None).await?;
        Ok(out)
    }

    /// Delete every record of a file.
    ///
    /// Per-record failures are returned in the report; see
    /// [`DeleteReport::into_result`]. Chunks left behind by an incomplete
    /// upload are deleted even when the metadata message is gone.
    #[instrument(skip(self))]
    pub async fn delete(&self, channel: &str, file_id: &str) -> Result<DeleteReport, StoreError> {
        let messages = self.index.list_all(channel).await?;

        let mut ids: Vec<String> = metadata_records(&messages)
            .filter(|(_, metadata)| metadata.id == file_id)
            .map(|(message, _)| message.id.clone())
            .collect();
        ids.extend(
            blob_records(&messages, file_id)
                .into_iter()
                .map(|b| b.message_id),
        );
        if ids.is_empty() {
            return Err(StoreError::FileNotFound(file_id.to_owned()));
        }

        debug!(file_id, records = ids.len(), "deleting file records");
        Ok(self.deleter.delete(channel, &ids).await)
    }

    /// Build a share code for a file. The code embeds `passphrase` in
    /// cleartext.
    #[instrument(skip(self, passphrase))]
    pub async fn share_code(
        &self,
        channel: &str,
        file_id: &str,
        passphrase: &str,
    ) -> Result<String, StoreError> {
        let messages = self.index.list_all(channel).await?;
        let metadata = find_metadata(&messages, file_id)?;
        let urls = ordered_urls(&messages, file_id)?;
        Ok(share::generate(passphrase, &urls, &metadata.name))
    }

    /// Reconstruct a shared file into `writer` without reading the channel.
    /// Returns the file name carried by the code.
    #[instrument(skip_all)]
    pub async fn get_shared<W>(
        &self,
        code: &str,
        writer: &mut W,
        progress: Option<&ProgressFn>,
    ) -> Result<String, StoreError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let ShareCode {
            key,
            ordered_blob_urls,
            file_name,
        } = ShareCode::decode(code)?;
        let key = EncryptionKey::from_passphrase(&key)?;

        let written = self
            .restore(&file_name, &ordered_blob_urls, None, &key, writer, progress)
            .await?;
        info!(file_name = %file_name, bytes = written, "shared file restored");
        Ok(file_name)
    }

    /// Reconstruct a shared file in memory.
    pub async fn get_shared_bytes(&self, code: &str) -> Result<SharedFile, StoreError> {
        let mut data = Vec::new();
        let name = self.get_shared(code, &mut data, None).await?;
        Ok(SharedFile { name, data })
    }

    /// Fetch `urls` in order and decrypt them as one stream into `writer`.
    ///
    /// When `expected_len` is known the fetched ciphertext must match it
    /// exactly.
    async fn restore<W>(
        &self,
        file_id: &str,
        urls: &[String],
        expected_len: Option<u64>,
        key: &EncryptionKey,
        writer: &mut W,
        progress: Option<&ProgressFn>,
    ) -> Result<u64, StoreError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut decryptor = StreamDecryptor::new(key)?;
        let total = urls.len() as u64;
        let mut fetched: u64 = 0;
        let mut written: u64 = 0;

        for (i, url) in urls.iter().enumerate() {
            let chunk: Bytes = self.transport.fetch_binary(url).await?;
            fetched += chunk.len() as u64;
            let plain = decryptor.push(&chunk)?;
            writer.write_all(&plain).await?;
            written += plain.len() as u64;
            if let Some(report) = progress {
                report(TransferProgress {
                    completed: i as u64 + 1,
                    total,
                });
            }
        }

        if let Some(expected) = expected_len
            && fetched != expected
        {
            return Err(StoreError::ChunksMissing {
                file_id: file_id.to_owned(),
                detail: format!("found {fetched} ciphertext bytes, expected {expected}"),
            });
        }

        let tail = decryptor.finish()?;
        writer.write_all(&tail).await?;
        writer.flush().await?;
        Ok(written + tail.len() as u64)
    }
}

/// Posts the chunks of one upload in sequence.
struct ChunkSender<'a> {
    store: &'a ObjectStore,
    channel: &'a str,
    file_id: &'a str,
    total: u64,
    next: u64,
    progress: Option<&'a ProgressFn>,
}

impl ChunkSender<'_> {
    async fn send(&mut self, chunk: Vec<u8>) -> Result<(), StoreError> {
        let index = self.next;
        let request = ApiRequest::post_file(
            endpoints::channel_messages(self.channel),
            format!("Chunk {} of {}", index + 1, self.total),
            chunk_filename(self.file_id, index),
            Bytes::from(chunk),
        );
        self.store.transport.send(request).await?;
        self.next += 1;
        debug!(file_id = self.file_id, index, total = self.total, "posted chunk");
        if let Some(report) = self.progress {
            report(TransferProgress {
                completed: self.next,
                total: self.total,
            });
        }
        Ok(())
    }
}

/// Parsed metadata messages, skipping malformed ones.
fn metadata_records(
    messages: &[RemoteMessage],
) -> impl Iterator<Item = (&RemoteMessage, FileMetadata)> {
    messages.iter().filter_map(|message| {
        match FileMetadata::from_message(message)? {
            Ok(metadata) => Some((message, metadata)),
            Err(e) => {
                warn!(error = %e, "skipping malformed metadata message");
                None
            }
        }
    })
}

fn find_metadata(messages: &[RemoteMessage], file_id: &str) -> Result<FileMetadata, StoreError> {
    metadata_records(messages)
        .find(|(_, metadata)| metadata.id == file_id)
        .map(|(_, metadata)| metadata)
        .ok_or_else(|| StoreError::FileNotFound(file_id.to_owned()))
}

/// Attachment URLs of a file's chunks in sequence order.
///
/// Indices must run `0..n` without gaps. When an index appears more than once
/// the oldest message wins.
fn ordered_urls(messages: &[RemoteMessage], file_id: &str) -> Result<Vec<String>, StoreError> {
    let mut by_index: BTreeMap<u64, BlobRecord> = BTreeMap::new();
    for blob in blob_records(messages, file_id) {
        match by_index.get(&blob.index) {
            Some(kept) if !is_older(&blob.message_id, &kept.message_id) => {
                warn!(
                    file_id,
                    index = blob.index,
                    message_id = %blob.message_id,
                    "ignoring duplicate chunk"
                );
            }
            Some(kept) => {
                warn!(
                    file_id,
                    index = blob.index,
                    message_id = %kept.message_id,
                    "ignoring duplicate chunk"
                );
                by_index.insert(blob.index, blob);
            }
            None => {
                by_index.insert(blob.index, blob);
            }
        }
    }

    if by_index.is_empty() {
        return Err(StoreError::ChunksMissing {
            file_id: file_id.to_owned(),
            detail: "no chunks found".into(),
        });
    }

    let count = by_index.len() as u64;
    let missing: Vec<String> = (0..=by_index.last_key_value().map_or(0, |(last, _)| *last))
        .filter(|i| !by_index.contains_key(i))
        .map(|i| i.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(StoreError::ChunksMissing {
            file_id: file_id.to_owned(),
            detail: format!(
                "missing chunk indices [{}] ({count} present)",
                missing.join(", ")
            ),
        });
    }

    Ok(by_index.into_values().map(|b| b.url).collect())
}

/// Compare snowflake ids numerically, falling back to string order.
fn is_older(a: &str, b: &str) -> bool {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a < b,
        _ => a < b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, file: &str, index: u64) -> RemoteMessage {
        RemoteMessage::with_attachment(
            id,
            "",
            chunk_filename(file, index),
            format!("u{index}-{id}"),
        )
    }

    #[test]
    fn urls_sorted_by_index() {
        let messages = vec![chunk("30", "f", 2), chunk("10", "f", 0), chunk("20", "f", 1)];
        assert_eq!(
            ordered_urls(&messages, "f").unwrap(),
            vec!["u0-10", "u1-20", "u2-30"]
        );
    }

    #[test]
    fn gaps_are_reported() {
        let messages = vec![chunk("30", "f", 3), chunk("10", "f", 0)];
        match ordered_urls(&messages, "f") {
            Err(StoreError::ChunksMissing { detail, .. }) => {
                assert!(detail.contains("[1, 2]"), "{detail}");
            }
            other => panic!("expected missing chunks, got {other:?}"),
        }
    }

    #[test]
    fn no_chunks_is_missing() {
        let messages = vec![RemoteMessage::text("1", "metadata:{}")];
        assert!(matches!(
            ordered_urls(&messages, "f"),
            Err(StoreError::ChunksMissing { .. })
        ));
    }

    #[test]
    fn duplicate_index_keeps_oldest() {
        let messages = vec![chunk("900", "f", 0), chunk("100", "f", 0), chunk("500", "f", 0)];
        assert_eq!(ordered_urls(&messages, "f").unwrap(), vec!["u0-100"]);
    }

    #[test]
    fn malformed_metadata_is_skipped() {
        let good = FileMetadata {
            id: "abc".into(),
            name: "a.txt".into(),
            size: 1,
            media_type: String::new(),
        };
        let messages = vec![
            RemoteMessage::text("2", "metadata:{broken"),
            RemoteMessage::text("1", good.to_content().unwrap()),
        ];
        let found: Vec<FileMetadata> = metadata_records(&messages).map(|(_, m)| m).collect();
        assert_eq!(found, vec![good]);
        assert!(matches!(
            find_metadata(&messages, "zzz"),
            Err(StoreError::FileNotFound(id)) if id == "zzz"
        ));
    }

    #[test]
    fn older_ids_compare_numerically() {
        assert!(is_older("99", "100"));
        assert!(!is_older("100", "99"));
    }
}
