use async_trait::async_trait;
use sqlx::postgres::{PgListener, PgPoolOptions};
use sqlx::{types::Json, Acquire, Executor, Pool, Postgres, Row};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{BathroomStore, Snapshot, SnapshotSender, Subscription};
use crate::{config::RetryPolicy, entities::BathroomRecord, error::Error};

type Database = Postgres;

const CHANGES_CHANNEL: &str = "bathrooms_changed";

pub struct PgStore {
    pool: Pool<Database>,
    retry: RetryPolicy,
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

impl PgStore {
    #[tracing::instrument(name = "PgStore::connect", skip(db_uri))]
    pub async fn connect(
        db_uri: &str,
        max_connections: u32,
        retry: RetryPolicy,
    ) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        Ok(Self::new(pool, retry))
    }

    pub fn new(pool: Pool<Database>, retry: RetryPolicy) -> Self {
        Self {
            pool,
            retry,
            watchers: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BathroomStore for PgStore {
    #[tracing::instrument(skip(self))]
    async fn open(&self) -> Result<(), Error> {
        self.pool
            .execute("CREATE TABLE IF NOT EXISTS bathrooms (id UUID PRIMARY KEY, data JSONB NOT NULL)")
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn close(&self) {
        for watcher in self.watchers.lock().await.drain(..) {
            watcher.abort();
        }

        self.pool.close().await;
    }

    #[tracing::instrument(skip(self, record), fields(name = %record.name))]
    async fn save(&self, record: BathroomRecord) -> Result<Uuid, Error> {
        let id = Uuid::new_v4();
        let record = record.with_id(id);

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        tx.execute(
            sqlx::query("INSERT INTO bathrooms (id, data) VALUES ($1, $2)")
                .bind(&id)
                .bind(Json(&record)),
        )
        .await?;

        tx.execute(
            sqlx::query("SELECT pg_notify($1, $2)")
                .bind(CHANGES_CHANNEL)
                .bind(id.to_string()),
        )
        .await?;

        tx.commit().await?;

        Ok(id)
    }

    #[tracing::instrument(skip(self))]
    async fn subscribe(&self) -> Result<Subscription, Error> {
        let listener = listen(&self.pool).await?;
        let snapshot = fetch_snapshot(&self.pool).await?;

        let (sender, subscription) = Subscription::channel();
        sender.send(snapshot);

        let watcher = tokio::spawn(watch(self.pool.clone(), listener, sender, self.retry));

        let mut watchers = self.watchers.lock().await;
        watchers.retain(|watcher| !watcher.is_finished());
        watchers.push(watcher);

        Ok(subscription)
    }
}

async fn listen(pool: &Pool<Database>) -> Result<PgListener, Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CHANGES_CHANNEL).await?;

    Ok(listener)
}

/// Turns a stored document into a record. The row id wins over any id embedded
/// in the document; documents that no longer decode are skipped.
fn decode(id: Uuid, data: serde_json::Value) -> Option<BathroomRecord> {
    match serde_json::from_value::<BathroomRecord>(data) {
        Ok(record) => Some(record.with_id(id)),
        Err(err) => {
            tracing::warn!("skipping malformed bathroom {}: {}", id, err);
            None
        }
    }
}

/// Reads the whole collection.
#[tracing::instrument(skip(pool))]
async fn fetch_snapshot(pool: &Pool<Database>) -> Result<Snapshot, Error> {
    let rows = pool
        .fetch_all(sqlx::query("SELECT id, data FROM bathrooms"))
        .await?;

    let mut snapshot = Vec::with_capacity(rows.len());

    for row in rows {
        let id: Uuid = row.try_get("id")?;
        let Json(data): Json<serde_json::Value> = row.try_get("data")?;

        snapshot.extend(decode(id, data));
    }

    Ok(snapshot)
}

/// Pushes a fresh snapshot for every change notification until the subscriber
/// cancels or the retry policy is exhausted.
#[tracing::instrument(skip_all)]
async fn watch(
    pool: Pool<Database>,
    mut listener: PgListener,
    sender: SnapshotSender,
    retry: RetryPolicy,
) {
    let mut failures = 0;

    loop {
        let received = tokio::select! {
            _ = sender.cancelled() => break,
            received = listener.try_recv() => received,
        };

        let result = match received {
            Ok(Some(notification)) => {
                tracing::debug!("bathroom changed: {}", notification.payload());
                fetch_snapshot(&pool).await
            }
            Ok(None) => {
                // notifications sent while disconnected are lost
                tracing::warn!("listener connection lost, resyncing");
                fetch_snapshot(&pool).await
            }
            Err(err) => Err(err.into()),
        };

        match result {
            Ok(snapshot) => {
                failures = 0;

                if !sender.send(snapshot) {
                    break;
                }
            }
            Err(err) => {
                failures += 1;

                if failures >= retry.max_attempts {
                    tracing::error!("giving up on live query after {} failures: {}", failures, err);
                    break;
                }

                let delay = retry.delay_for(failures);
                tracing::warn!("live query failed ({}), retrying in {:?}", err, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }

    tracing::debug!("live query stopped");
}

#[test]
fn malformed_documents_are_skipped() {
    use serde_json::json;

    let id = Uuid::new_v4();

    assert!(decode(id, json!({ "name": "Cafe" })).is_none());
    assert!(decode(id, json!("not a document")).is_none());
    assert!(decode(
        id,
        json!({
            "name": "Cafe",
            "isUnisex": "sometimes",
            "location": { "latitude": 1.0, "longitude": 2.0 },
        })
    )
    .is_none());
}

#[test]
fn well_formed_documents_take_the_row_id() {
    use crate::entities::Coordinate;
    use serde_json::json;

    let id = Uuid::new_v4();
    let record = decode(
        id,
        json!({
            "name": "Cafe",
            "code": "1234",
            "isUnisex": true,
            "cleanRating": 4,
            "location": { "latitude": 1.0, "longitude": 2.0 },
        }),
    )
    .unwrap();

    assert_eq!(record.id, Some(id));
    assert_eq!(record.name, "Cafe");
    assert_eq!(record.code.as_deref(), Some("1234"));
    assert_eq!(record.notes, "");
    assert!(record.is_unisex);
    assert_eq!(record.clean_rating, Some(4));
    assert_eq!(record.bathroom_rating, None);
    assert_eq!(record.location, Coordinate::new(1.0, 2.0));
}

#[test]
fn embedded_id_is_overridden_by_the_row_id() {
    use serde_json::json;

    let row_id = Uuid::new_v4();
    let embedded_id = Uuid::new_v4();

    let record = decode(
        row_id,
        json!({
            "id": embedded_id,
            "name": "Cafe",
            "isUnisex": false,
            "location": { "latitude": 1.0, "longitude": 2.0 },
        }),
    )
    .unwrap();

    assert_eq!(record.id, Some(row_id));
}
