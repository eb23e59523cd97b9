mod memory;
mod postgres;
mod subscription;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use subscription::{Snapshot, SnapshotSender, Subscription};

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{entities::BathroomRecord, error::Error};

/// Document store holding the bathroom collection.
#[async_trait]
pub trait BathroomStore {
    async fn open(&self) -> Result<(), Error>;

    async fn close(&self);

    /// Persists the record and returns the id the store assigned to it.
    async fn save(&self, record: BathroomRecord) -> Result<Uuid, Error>;

    /// Registers a live query. The subscription yields the full collection
    /// right away and again after every change.
    async fn subscribe(&self) -> Result<Subscription, Error>;
}

pub type DynStore = Arc<dyn BathroomStore + Send + Sync>;
