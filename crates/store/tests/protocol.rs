//! Upload, listing and download against an in-memory channel.

mod common;

use std::sync::{Arc, Mutex};

use chanvault_core::{FileMetadata, METADATA_PREFIX, chunk_index};
use chanvault_crypto::ciphertext_len;
use chanvault_store::{StoreError, TransferProgress, Upload};
use chrono::Utc;
use common::*;

#[tokio::test]
async fn round_trip_small_file() {
    let (channel, store) = store(18 * MIB);
    let data = b"hello, channel".to_vec();

    let id = store
        .put_bytes(CHANNEL, "hello.txt", "text/plain", &data, &key())
        .await
        .unwrap();

    assert_eq!(channel.message_count(CHANNEL), 2);
    assert_eq!(store.get(CHANNEL, &id, &key()).await.unwrap(), data);
}

#[tokio::test]
async fn round_trip_empty_file() {
    let (channel, store) = store(18 * MIB);

    let id = store
        .put_bytes(CHANNEL, "empty", "", &[], &key())
        .await
        .unwrap();

    assert_eq!(channel.message_count(CHANNEL), 2);
    assert!(store.get(CHANNEL, &id, &key()).await.unwrap().is_empty());
}

#[tokio::test]
async fn chunk_size_does_not_change_plaintext() {
    let data = payload(11 * MIB + 123);

    for chunk_size in [MIB, 5 * MIB, 5 * MIB + 16, 7 * MIB + 1, 18 * MIB] {
        let (channel, store) = store(chunk_size);
        let id = store
            .put_bytes(CHANNEL, "big.bin", "", &data, &key())
            .await
            .unwrap();

        let expected_chunks = ciphertext_len(data.len() as u64).div_ceil(chunk_size as u64);
        assert_eq!(
            channel.message_count(CHANNEL) as u64,
            expected_chunks + 1,
            "chunk size {chunk_size}"
        );
        assert_eq!(
            store.get(CHANNEL, &id, &key()).await.unwrap(),
            data,
            "chunk size {chunk_size}"
        );
    }
}

#[tokio::test]
async fn records_follow_wire_format() {
    let (channel, store) = store(MIB);
    let data = payload(2 * MIB);

    let id = store
        .put_bytes(CHANNEL, "report.pdf", "application/pdf", &data, &key())
        .await
        .unwrap();

    // Oldest first: metadata, then chunks in order.
    let mut messages = channel.messages(CHANNEL);
    messages.reverse();

    let content = messages[0].content.strip_prefix(METADATA_PREFIX).unwrap();
    let metadata: FileMetadata = serde_json::from_str(content).unwrap();
    assert_eq!(metadata.id, id);
    assert_eq!(metadata.name, "report.pdf");
    assert_eq!(metadata.size, data.len() as u64);
    assert_eq!(metadata.media_type, "application/pdf");
    assert!(messages[0].attachments.is_empty());

    let total = messages.len() - 1;
    assert_eq!(total, 3);
    for (n, message) in messages[1..].iter().enumerate() {
        assert_eq!(message.content, format!("Chunk {} of {total}", n + 1));
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.attachments[0].filename, format!("{id}_chunk_{n}"));
        assert_eq!(
            chunk_index(&message.attachments[0].filename, &id),
            Some(n as u64)
        );
    }
}

#[tokio::test]
async fn shuffled_chunks_are_reordered() {
    let (channel, store) = store(MIB);
    let data = payload(3 * MIB + 500);
    let meta = metadata("shuffled1", "s.bin", data.len());

    seed_file(&channel, &meta, &data, MIB, &[2, 0, 3, 1], Utc::now());

    assert_eq!(store.get(CHANNEL, "shuffled1", &key()).await.unwrap(), data);
}

#[tokio::test]
async fn listing_includes_metadata_only_files() {
    let (channel, store) = store(MIB);
    let stored = store
        .put_bytes(CHANNEL, "a.txt", "text/plain", b"aaaa", &key())
        .await
        .unwrap();
    channel.insert(
        CHANNEL,
        Utc::now(),
        metadata("orphanmeta", "b.txt", 10).to_content().unwrap(),
        None,
    );
    channel.insert(CHANNEL, Utc::now(), "unrelated chatter", None);
    channel.insert(CHANNEL, Utc::now(), "metadata:{not json", None);

    let files = store.list(CHANNEL).await.unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].id, "orphanmeta");
    assert_eq!(files[0].chunk_count, 0);
    assert_eq!(files[1].id, stored);
    assert_eq!(files[1].name, "a.txt");
    assert_eq!(files[1].media_type, "text/plain");
    assert_eq!(files[1].size, 4);
    assert_eq!(files[1].chunk_count, 1);

    assert!(matches!(
        store.get(CHANNEL, "orphanmeta", &key()).await,
        Err(StoreError::ChunksMissing { .. })
    ));
}

#[tokio::test]
async fn listing_walks_every_page() {
    let (channel, store) = store_with(
        chanvault_store::StoreConfig::default()
            .with_chunk_size(MIB)
            .with_page_size(10),
    );
    for i in 0..25 {
        channel.insert(
            CHANNEL,
            Utc::now(),
            metadata(&format!("file{i}"), "x", 0).to_content().unwrap(),
            None,
        );
    }

    let files = store.list(CHANNEL).await.unwrap();
    assert_eq!(files.len(), 25);
    assert_eq!(files[0].id, "file24");
    assert_eq!(channel.page_requests(), 3);
}

#[tokio::test]
async fn unknown_file_is_not_found() {
    let (_channel, store) = store(MIB);
    assert!(matches!(
        store.get(CHANNEL, "nope", &key()).await,
        Err(StoreError::FileNotFound(id)) if id == "nope"
    ));
}

#[tokio::test]
async fn wrong_passphrase_fails_decryption() {
    let (_channel, store) = store(MIB);
    let id = store
        .put_bytes(CHANNEL, "s", "", &payload(1000), &key())
        .await
        .unwrap();

    let wrong = chanvault_crypto::EncryptionKey::from_passphrase("wrong").unwrap();
    assert!(matches!(
        store.get(CHANNEL, &id, &wrong).await,
        Err(StoreError::DecryptionFailure(_))
    ));
}

#[tokio::test]
async fn tampered_chunk_fails_decryption() {
    let (channel, store) = store(MIB);
    let data = payload(2 * MIB);
    let id = store
        .put_bytes(CHANNEL, "t", "", &data, &key())
        .await
        .unwrap();

    let message = channel
        .messages(CHANNEL)
        .into_iter()
        .find(|m| m.attachments.first().is_some_and(|a| a.filename.ends_with("_chunk_1")))
        .unwrap();
    let url = &message.attachments[0].url;
    let mut bytes = chanvault_transport::Transport::fetch_binary(channel.as_ref(), url)
        .await
        .unwrap()
        .to_vec();
    bytes[100] ^= 0x01;
    channel.replace_attachment(url, bytes.into());

    assert!(matches!(
        store.get(CHANNEL, &id, &key()).await,
        Err(StoreError::DecryptionFailure(_))
    ));
}

#[tokio::test]
async fn missing_chunks_are_detected() {
    let data = payload(3 * MIB);

    // A gap in the middle.
    let (channel, store) = store(MIB);
    let meta = metadata("gap", "g", data.len());
    let ids = seed_file(&channel, &meta, &data, MIB, &[0, 1, 2, 3], Utc::now());
    channel.remove_message(CHANNEL, &ids[1]);
    match store.get(CHANNEL, "gap", &key()).await {
        Err(StoreError::ChunksMissing { file_id, detail }) => {
            assert_eq!(file_id, "gap");
            assert!(detail.contains("[1]"), "{detail}");
        }
        other => panic!("expected missing chunks, got {other:?}"),
    }

    // The trailing chunk.
    let meta = metadata("tail", "t", data.len());
    let ids = seed_file(&channel, &meta, &data, MIB, &[0, 1, 2, 3], Utc::now());
    channel.remove_message(CHANNEL, &ids[3]);
    assert!(matches!(
        store.get(CHANNEL, "tail", &key()).await,
        Err(StoreError::ChunksMissing { .. })
    ));
}

#[tokio::test]
async fn duplicate_chunk_keeps_oldest() {
    let (channel, store) = store(MIB);
    let data = payload(MIB / 2);
    let meta = metadata("dup", "d", data.len());
    seed_file(&channel, &meta, &data, MIB, &[0], Utc::now());

    // A later message claiming the same index with garbage content.
    channel.insert(
        CHANNEL,
        Utc::now(),
        "Chunk 1 of 1",
        Some(chanvault_transport::FileUpload {
            filename: "dup_chunk_0".into(),
            data: bytes::Bytes::from_static(b"garbage"),
        }),
    );

    assert_eq!(store.get(CHANNEL, "dup", &key()).await.unwrap(), data);

    let files = store.list(CHANNEL).await.unwrap();
    assert_eq!(files[0].chunk_count, 1);

    let mut out = Vec::new();
    let restored = store
        .get_into(CHANNEL, "dup", &key(), &mut out, None)
        .await
        .unwrap();
    assert_eq!(restored.name, "d");
    assert_eq!(restored.bytes, data.len() as u64);
}

#[tokio::test]
async fn declared_size_must_match_source() {
    let (_channel, store) = store(MIB);
    let data = payload(4096);

    let err = store
        .put(
            CHANNEL,
            Upload::new(&data[..], 5000, "short"),
            &key(),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::SourceLength {
            expected: 5000,
            actual: 4096
        }
    ));

    let err = store
        .put(CHANNEL, Upload::new(&data[..], 100, "long"), &key(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::SourceLength { expected: 100, .. }));
}

#[tokio::test]
async fn progress_is_reported_per_chunk() {
    let (_channel, store) = store(MIB);
    let data = payload(2 * MIB);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let progress = move |p: TransferProgress| sink.lock().unwrap().push(p);

    let id = store
        .put(
            CHANNEL,
            Upload::new(&data[..], data.len() as u64, "p.bin"),
            &key(),
            Some(&progress),
        )
        .await
        .unwrap();

    let uploaded: Vec<(u64, u64)> = events
        .lock()
        .unwrap()
        .drain(..)
        .map(|p| (p.completed, p.total))
        .collect();
    assert_eq!(uploaded, vec![(1, 3), (2, 3), (3, 3)]);

    let mut out = Vec::new();
    let restored = store
        .get_into(CHANNEL, &id, &key(), &mut out, Some(&progress))
        .await
        .unwrap();
    assert_eq!(restored.bytes, data.len() as u64);
    assert_eq!(out, data);
    assert_eq!(events.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn sixty_mib_in_twenty_five_mib_chunks() {
    let (channel, store) = store(25 * MIB);
    let data = payload(60 * MIB);

    let id = store
        .put_bytes(CHANNEL, "video.mp4", "video/mp4", &data, &key())
        .await
        .unwrap();
    assert_eq!(channel.message_count(CHANNEL), 4);

    let files = store.list(CHANNEL).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].chunk_count, 3);
    assert_eq!(files[0].size, 60 * MIB as u64);

    assert_eq!(store.get(CHANNEL, &id, &key()).await.unwrap(), data);

    let report = store.delete(CHANNEL, &id).await.unwrap();
    assert_eq!(report.deleted(), 4);
    assert!(report.is_complete());
    assert_eq!(channel.message_count(CHANNEL), 0);
}
