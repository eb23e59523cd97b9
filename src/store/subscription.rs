use async_channel::{Receiver, Sender};
use futures::stream::{self, Stream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::entities::BathroomRecord;

/// The complete contents of the collection at one point in time.
pub type Snapshot = Vec<BathroomRecord>;

#[derive(Debug, Default)]
struct Cancellation {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Receiving half of a live query. Clones share the same cancellation state,
/// and dropping the last clone cancels it.
#[derive(Clone, Debug)]
pub struct Subscription {
    receiver: Receiver<Snapshot>,
    cancellation: Arc<Cancellation>,
}

/// Store-side half used to push snapshots to one subscriber.
#[derive(Clone, Debug)]
pub struct SnapshotSender {
    sender: Sender<Snapshot>,
    cancellation: Arc<Cancellation>,
}

impl Subscription {
    pub fn channel() -> (SnapshotSender, Subscription) {
        let (sender, receiver) = async_channel::unbounded();
        let cancellation = Arc::new(Cancellation::default());

        (
            SnapshotSender {
                sender,
                cancellation: cancellation.clone(),
            },
            Subscription {
                receiver,
                cancellation,
            },
        )
    }

    /// Waits for the next snapshot. Snapshots that queued up while the caller
    /// was busy are skipped in favour of the newest one. Returns `None` once
    /// the subscription is cancelled or the store stops delivering.
    pub async fn next(&self) -> Option<Snapshot> {
        if self.is_cancelled() {
            return None;
        }

        let mut snapshot = self.receiver.recv().await.ok()?;
        while let Ok(newer) = self.receiver.try_recv() {
            snapshot = newer;
        }

        if self.is_cancelled() {
            return None;
        }

        Some(snapshot)
    }

    /// Stops delivery. Safe to call any number of times.
    pub fn cancel(&self) {
        if self.cancellation.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        self.receiver.close();
        self.cancellation.notify.notify_one();

        tracing::debug!("subscription cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.cancelled.load(Ordering::SeqCst)
    }

    pub fn into_stream(self) -> impl Stream<Item = Snapshot> {
        stream::unfold(self, |subscription| async move {
            let snapshot = subscription.next().await?;
            Some((snapshot, subscription))
        })
    }
}

impl Drop for Subscription {
    /// Dropping the last handle cancels, so the store side stops watching.
    fn drop(&mut self) {
        if self.receiver.receiver_count() == 1 {
            self.cancel();
        }
    }
}

impl SnapshotSender {
    /// Queues a snapshot. Returns `false` when the subscriber is gone and the
    /// sender should be dropped.
    pub fn send(&self, snapshot: Snapshot) -> bool {
        if self.is_cancelled() {
            return false;
        }

        self.sender.try_send(snapshot).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.cancelled.load(Ordering::SeqCst) || self.sender.is_closed()
    }

    /// Resolves once the subscriber cancels or drops every handle.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.cancellation.notify.notified().await;
        }
    }
}

#[cfg(test)]
fn snapshot_named(name: &str) -> Snapshot {
    use crate::entities::Coordinate;

    vec![BathroomRecord {
        id: Some(uuid::Uuid::new_v4()),
        name: name.into(),
        code: None,
        notes: "".into(),
        is_unisex: false,
        clean_rating: None,
        bathroom_rating: None,
        location: Coordinate::new(0.0, 0.0),
    }]
}

#[tokio::test]
async fn next_skips_to_the_newest_snapshot() {
    let (sender, subscription) = Subscription::channel();

    assert!(sender.send(snapshot_named("first")));
    assert!(sender.send(snapshot_named("second")));

    let snapshot = subscription.next().await.unwrap();
    assert_eq!(snapshot[0].name, "second");
}

#[tokio::test]
async fn cancel_is_idempotent_and_stops_delivery() {
    let (sender, subscription) = Subscription::channel();

    assert!(sender.send(snapshot_named("buffered")));

    subscription.cancel();
    subscription.cancel();

    assert!(subscription.is_cancelled());
    assert!(subscription.next().await.is_none());
    assert!(!sender.send(snapshot_named("late")));

    tokio::time::timeout(std::time::Duration::from_secs(1), sender.cancelled())
        .await
        .unwrap();
}

#[tokio::test]
async fn dropped_sender_ends_the_subscription() {
    let (sender, subscription) = Subscription::channel();
    drop(sender);

    assert!(subscription.next().await.is_none());
    assert!(!subscription.is_cancelled());
}

#[tokio::test]
async fn stream_ends_after_cancel() {
    use futures::StreamExt;

    let (sender, subscription) = Subscription::channel();
    let handle = subscription.clone();
    let mut stream = Box::pin(subscription.into_stream());

    assert!(sender.send(snapshot_named("first")));
    assert_eq!(stream.next().await.unwrap()[0].name, "first");

    handle.cancel();
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn dropping_the_last_handle_cancels() {
    let (sender, subscription) = Subscription::channel();
    let clone = subscription.clone();

    drop(subscription);
    assert!(!sender.is_cancelled());
    assert!(sender.send(snapshot_named("still live")));

    let waiter = sender.clone();
    let watcher = tokio::spawn(async move { waiter.cancelled().await });

    drop(clone);

    tokio::time::timeout(std::time::Duration::from_secs(1), watcher)
        .await
        .unwrap()
        .unwrap();
    assert!(!sender.send(snapshot_named("late")));
}
