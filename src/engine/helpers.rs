use uuid::Uuid;

use crate::{
    config::RetryPolicy,
    entities::BathroomRecord,
    error::Error,
    store::{BathroomStore, DynStore, Subscription},
};

/// Saves with exponential backoff. Validation-style errors and a closed store
/// are not retried.
#[tracing::instrument(skip(store, record), fields(name = %record.name))]
pub async fn save_with_retry(
    store: DynStore,
    record: BathroomRecord,
    retry: RetryPolicy,
) -> Result<Uuid, Error> {
    let mut attempt = 0;

    loop {
        attempt += 1;

        match store.save(record.clone()).await {
            Ok(id) => {
                tracing::info!("saved bathroom {}", id);
                return Ok(id);
            }
            Err(err)
                if err.is_invalid_input_error()
                    || err.is_store_closed_error()
                    || attempt >= retry.max_attempts =>
            {
                tracing::error!("failed to save bathroom after {} attempts: {}", attempt, err);
                return Err(err);
            }
            Err(err) => {
                let delay = retry.delay_for(attempt);
                tracing::warn!("save attempt {} failed ({}), retrying in {:?}", attempt, err, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[tracing::instrument(skip(store))]
pub async fn subscribe_with_retry(
    store: &DynStore,
    retry: RetryPolicy,
) -> Result<Subscription, Error> {
    let mut attempt = 0;

    loop {
        attempt += 1;

        match store.subscribe().await {
            Ok(subscription) => return Ok(subscription),
            Err(err) if err.is_store_closed_error() || attempt >= retry.max_attempts => {
                tracing::error!("failed to subscribe after {} attempts: {}", attempt, err);
                return Err(err);
            }
            Err(err) => {
                let delay = retry.delay_for(attempt);
                tracing::warn!("subscribe attempt {} failed ({}), retrying in {:?}", attempt, err, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
fn quick_retry(max_attempts: u32) -> RetryPolicy {
    use std::time::Duration;

    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

#[cfg(test)]
fn record() -> BathroomRecord {
    use crate::entities::Coordinate;

    BathroomRecord {
        id: None,
        name: "Cafe".into(),
        code: None,
        notes: "".into(),
        is_unisex: false,
        clean_rating: None,
        bathroom_rating: None,
        location: Coordinate::new(0.0, 0.0),
    }
}

#[tokio::test]
async fn transient_save_failures_are_retried() {
    use crate::store::MemoryStore;
    use std::sync::Arc;

    let store = Arc::new(MemoryStore::new());
    store.open().await.unwrap();
    store.fail_next_saves(2).await;

    let id = save_with_retry(store.clone(), record(), quick_retry(3))
        .await
        .unwrap();

    assert_eq!(store.records().await[0].id, Some(id));
}

#[tokio::test]
async fn save_gives_up_after_max_attempts() {
    use crate::store::MemoryStore;
    use std::sync::Arc;

    let store = Arc::new(MemoryStore::new());
    store.open().await.unwrap();
    store.fail_next_saves(3).await;

    let result = save_with_retry(store.clone(), record(), quick_retry(3)).await;

    assert!(result.is_err());
    assert!(store.records().await.is_empty());
}

#[tokio::test]
async fn saving_to_a_closed_store_stops_at_once() {
    use crate::store::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    let store = Arc::new(MemoryStore::new());
    let slow_retry = RetryPolicy {
        max_attempts: 4,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(1),
    };

    let result = tokio::time::timeout(
        Duration::from_millis(500),
        save_with_retry(store.clone(), record(), slow_retry),
    )
    .await
    .unwrap();

    assert!(result.unwrap_err().is_store_closed_error());
    assert!(store.records().await.is_empty());
}

#[tokio::test]
async fn subscribing_to_a_closed_store_is_surfaced() {
    use crate::store::MemoryStore;
    use std::sync::Arc;

    let store: DynStore = Arc::new(MemoryStore::new());

    let err = subscribe_with_retry(&store, quick_retry(3)).await.unwrap_err();

    assert!(err.is_store_closed_error());
}
