use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{BathroomStore, Snapshot, SnapshotSender, Subscription};
use crate::{
    entities::BathroomRecord,
    error::{store_closed_error, unexpected_error, Error},
};

/// In-process store with the same contract as the database backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    open: bool,
    records: Vec<BathroomRecord>,
    subscribers: Vec<SnapshotSender>,
    failing_saves: u32,
    failing_subscribes: u32,
}

impl State {
    fn broadcast(&mut self) {
        let snapshot: Snapshot = self.records.clone();

        self.subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()));
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` saves fail.
    pub async fn fail_next_saves(&self, count: u32) {
        self.state.lock().await.failing_saves = count;
    }

    /// Makes the next `count` subscribe calls fail.
    pub async fn fail_next_subscribes(&self, count: u32) {
        self.state.lock().await.failing_subscribes = count;
    }

    /// Drops a record, as another client deleting the document would.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, id: Uuid) -> Option<BathroomRecord> {
        let mut state = self.state.lock().await;

        let index = state.records.iter().position(|record| record.id == Some(id))?;
        let record = state.records.remove(index);
        state.broadcast();

        Some(record)
    }

    pub async fn records(&self) -> Snapshot {
        self.state.lock().await.records.clone()
    }

    pub async fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock().await;
        state.subscribers.retain(|subscriber| !subscriber.is_cancelled());
        state.subscribers.len()
    }
}

#[async_trait]
impl BathroomStore for MemoryStore {
    #[tracing::instrument(skip(self))]
    async fn open(&self) -> Result<(), Error> {
        self.state.lock().await.open = true;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn close(&self) {
        let mut state = self.state.lock().await;

        state.open = false;
        state.subscribers.clear();
    }

    #[tracing::instrument(skip(self, record), fields(name = %record.name))]
    async fn save(&self, record: BathroomRecord) -> Result<Uuid, Error> {
        let mut state = self.state.lock().await;

        if !state.open {
            return Err(store_closed_error());
        }

        if state.failing_saves > 0 {
            state.failing_saves -= 1;
            return Err(unexpected_error());
        }

        let id = Uuid::new_v4();
        state.records.push(record.with_id(id));
        state.broadcast();

        Ok(id)
    }

    #[tracing::instrument(skip(self))]
    async fn subscribe(&self) -> Result<Subscription, Error> {
        let mut state = self.state.lock().await;

        if !state.open {
            return Err(store_closed_error());
        }

        if state.failing_subscribes > 0 {
            state.failing_subscribes -= 1;
            return Err(unexpected_error());
        }

        let (sender, subscription) = Subscription::channel();
        sender.send(state.records.clone());
        state.subscribers.push(sender);

        Ok(subscription)
    }
}

#[cfg(test)]
fn record(name: &str) -> BathroomRecord {
    use crate::entities::Coordinate;

    BathroomRecord {
        id: None,
        name: name.into(),
        code: Some("1234".into()),
        notes: "".into(),
        is_unisex: true,
        clean_rating: Some(5),
        bathroom_rating: Some(4),
        location: Coordinate::new(47.6, -122.3),
    }
}

#[tokio::test]
async fn closed_store_rejects_operations() {
    use tokio_test::assert_err;

    let store = MemoryStore::new();

    assert_err!(store.save(record("Cafe")).await);
    assert_err!(store.subscribe().await);
}

#[tokio::test]
async fn subscribe_delivers_the_full_collection_on_every_change() {
    let store = MemoryStore::new();
    store.open().await.unwrap();

    let first = store.save(record("Cafe")).await.unwrap();
    let subscription = store.subscribe().await.unwrap();

    let snapshot = subscription.next().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, Some(first));

    let second = store.save(record("Library")).await.unwrap();

    let snapshot = subscription.next().await.unwrap();
    let ids: Vec<_> = snapshot.iter().map(|record| record.id).collect();
    assert_eq!(ids, vec![Some(first), Some(second)]);

    store.remove(first).await.unwrap();

    let snapshot = subscription.next().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].name, "Library");
}

#[tokio::test]
async fn saved_record_comes_back_unchanged_apart_from_its_id() {
    let store = MemoryStore::new();
    store.open().await.unwrap();

    let id = store.save(record("Cafe")).await.unwrap();

    let stored = store.records().await;
    assert_eq!(stored, vec![record("Cafe").with_id(id)]);
}

#[tokio::test]
async fn injected_failures_are_reported() {
    let store = MemoryStore::new();
    store.open().await.unwrap();
    store.fail_next_saves(1).await;

    assert!(store.save(record("Cafe")).await.is_err());
    assert!(store.save(record("Cafe")).await.is_ok());
    assert_eq!(store.records().await.len(), 1);
}

#[tokio::test]
async fn cancelled_subscribers_are_dropped() {
    let store = MemoryStore::new();
    store.open().await.unwrap();

    let subscription = store.subscribe().await.unwrap();
    assert_eq!(store.subscriber_count().await, 1);

    subscription.cancel();
    assert_eq!(store.subscriber_count().await, 0);

    store.save(record("Cafe")).await.unwrap();
    assert!(subscription.next().await.is_none());
}

#[tokio::test]
async fn close_ends_open_subscriptions() {
    let store = MemoryStore::new();
    store.open().await.unwrap();

    let subscription = store.subscribe().await.unwrap();
    subscription.next().await.unwrap();

    store.close().await;

    assert!(subscription.next().await.is_none());
}
