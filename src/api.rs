use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{BathroomRecord, Coordinate, DisplayAnnotation, MapAnnotation, RawInput};
use crate::error::Error;

#[async_trait]
pub trait BathroomAPI {
    /// Validates the input and hands the record to the store without waiting
    /// for it to be persisted. The returned record has no id yet.
    async fn create_bathroom(&self, raw: RawInput) -> Result<BathroomRecord, Error>;

    async fn find_bathroom(&self, id: Uuid) -> Result<DisplayAnnotation, Error>;
}

#[async_trait]
pub trait MapAPI {
    async fn list_annotations(&self) -> Vec<MapAnnotation>;

    async fn update_user_position(&self, coordinate: Coordinate) -> Result<(), Error>;
}

pub trait API: BathroomAPI + MapAPI {}
