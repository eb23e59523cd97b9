mod bathroom_api;
mod helpers;
mod map_api;

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::{
    api::API,
    config::{Config, RetryPolicy},
    error::Error,
    reconciler::Reconciler,
    store::{BathroomStore, DynStore, Subscription},
    validation::CodePolicy,
};

use helpers::subscribe_with_retry;

type SharedSubscription = Arc<Mutex<Option<Subscription>>>;

pub struct Engine {
    store: DynStore,
    reconciler: Arc<Mutex<Reconciler>>,
    subscription: SharedSubscription,
    consumer: Mutex<Option<JoinHandle<()>>>,
    code_policy: CodePolicy,
    retry: RetryPolicy,
}

impl Engine {
    /// Opens the store, subscribes to the bathroom collection and starts the
    /// task that applies snapshots to the displayed set.
    #[tracing::instrument(name = "Engine::start", skip_all)]
    pub async fn start(store: DynStore, config: &Config) -> Result<Self, Error> {
        store.open().await?;

        let subscription = match subscribe_with_retry(&store, config.retry).await {
            Ok(subscription) => subscription,
            Err(err) => {
                store.close().await;
                return Err(err);
            }
        };
        let subscription: SharedSubscription = Arc::new(Mutex::new(Some(subscription)));
        let reconciler = Arc::new(Mutex::new(Reconciler::new()));

        let consumer = tokio::spawn(consume(
            store.clone(),
            subscription.clone(),
            reconciler.clone(),
            config.retry,
        ));

        tracing::info!("engine started");

        Ok(Self {
            store,
            reconciler,
            subscription,
            consumer: Mutex::new(Some(consumer)),
            code_policy: config.code_policy,
            retry: config.retry,
        })
    }

    /// Cancels the live query and closes the store. Calling it again is a
    /// no-op.
    #[tracing::instrument(name = "Engine::shutdown", skip_all)]
    pub async fn shutdown(&self) {
        let subscription = self.subscription.lock().await.take();
        let Some(subscription) = subscription else {
            return;
        };

        subscription.cancel();

        if let Some(consumer) = self.consumer.lock().await.take() {
            if let Err(err) = consumer.await {
                tracing::error!("snapshot consumer failed: {}", err);
            }
        }

        self.store.close().await;

        tracing::info!("engine stopped");
    }
}

/// Applies snapshots one at a time. When the store stops delivering without
/// being cancelled the collection is re-subscribed.
#[tracing::instrument(skip_all)]
async fn consume(
    store: DynStore,
    current: SharedSubscription,
    reconciler: Arc<Mutex<Reconciler>>,
    retry: RetryPolicy,
) {
    loop {
        let subscription = match current.lock().await.clone() {
            Some(subscription) => subscription,
            None => break,
        };

        while let Some(snapshot) = subscription.next().await {
            let diff = reconciler.lock().await.apply(&snapshot);

            if !diff.is_empty() {
                tracing::info!(
                    "snapshot applied: {} removed, {} added",
                    diff.to_remove.len(),
                    diff.to_add.len()
                );
            }
        }

        if subscription.is_cancelled() {
            break;
        }

        tracing::warn!("live query ended, resubscribing");

        match subscribe_with_retry(&store, retry).await {
            Ok(resubscribed) => {
                let mut current = current.lock().await;

                if current.is_none() {
                    resubscribed.cancel();
                    break;
                }

                *current = Some(resubscribed);
            }
            Err(err) => {
                tracing::error!("map is no longer live: {}", err);
                break;
            }
        }
    }
}

impl API for Engine {}

#[cfg(test)]
pub(crate) async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return true;
        }

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    false
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    use std::time::Duration;

    Config {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
        ..Config::default()
    }
}

#[tokio::test]
async fn shutdown_is_idempotent_and_closes_the_store() {
    use crate::store::MemoryStore;

    let store = Arc::new(MemoryStore::new());
    let engine = Engine::start(store.clone(), &test_config()).await.unwrap();

    assert_eq!(store.subscriber_count().await, 1);

    engine.shutdown().await;
    engine.shutdown().await;

    assert_eq!(store.subscriber_count().await, 0);
    assert!(store.subscribe().await.is_err());
}

#[tokio::test]
async fn failed_start_closes_the_store() {
    use crate::entities::{BathroomRecord, Coordinate};
    use crate::store::MemoryStore;

    let store = Arc::new(MemoryStore::new());
    store.fail_next_subscribes(3).await;

    assert!(Engine::start(store.clone(), &test_config()).await.is_err());

    let err = store
        .save(BathroomRecord {
            id: None,
            name: "Cafe".into(),
            code: None,
            notes: "".into(),
            is_unisex: false,
            clean_rating: None,
            bathroom_rating: None,
            location: Coordinate::new(0.0, 0.0),
        })
        .await
        .unwrap_err();
    assert!(err.is_store_closed_error());
}

#[tokio::test]
async fn existing_records_are_displayed_on_start() {
    use crate::entities::{BathroomRecord, Coordinate};
    use crate::store::MemoryStore;

    let store = Arc::new(MemoryStore::new());
    store.open().await.unwrap();
    store
        .save(BathroomRecord {
            id: None,
            name: "Cafe".into(),
            code: None,
            notes: "".into(),
            is_unisex: true,
            clean_rating: None,
            bathroom_rating: None,
            location: Coordinate::new(0.0, 0.0),
        })
        .await
        .unwrap();

    let engine = Engine::start(store.clone(), &test_config()).await.unwrap();

    let engine_ref = &engine;
    assert!(eventually(move || async move { engine_ref.reconciler.lock().await.len() == 1 }).await);

    engine.shutdown().await;
}
