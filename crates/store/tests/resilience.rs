//! Behaviour under the backend's rate limiting.

mod common;

use std::time::Duration;

use chanvault_store::{StoreConfig, StoreError};
use chanvault_transport::RetryPolicy;
use common::*;

#[tokio::test(start_paused = true)]
async fn rate_limited_calls_are_retried() {
    let (channel, store) = store(MIB);
    let data = payload(2 * MIB);

    channel.rate_limit_next(None);
    channel.rate_limit_next(Some(Duration::from_millis(2500)));
    let id = store
        .put_bytes(CHANNEL, "r", "", &data, &key())
        .await
        .unwrap();

    channel.rate_limit_next(None);
    assert_eq!(store.get(CHANNEL, &id, &key()).await.unwrap(), data);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_as_transient_overload() {
    let (channel, store) = store_with(
        StoreConfig::default().with_retry(RetryPolicy::linear(
            2,
            Duration::from_millis(10),
            Duration::from_millis(10),
        )),
    );
    for _ in 0..3 {
        channel.rate_limit_next(None);
    }

    let err = store.list(CHANNEL).await.unwrap_err();
    assert!(matches!(err, StoreError::TransientOverload { attempts: 3 }));
    assert_eq!(channel.page_requests(), 0);
}

#[tokio::test]
async fn retry_can_be_disabled() {
    let (channel, store) = store_with(StoreConfig::default().with_retry(RetryPolicy::none()));
    channel.rate_limit_next(None);

    let err = store.list(CHANNEL).await.unwrap_err();
    assert!(matches!(err, StoreError::TransientOverload { attempts: 1 }));

    // The queued answer was consumed; the next call goes through.
    assert!(store.list(CHANNEL).await.unwrap().is_empty());
}
