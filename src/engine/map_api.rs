use super::Engine;

use async_trait::async_trait;

use crate::{
    api::MapAPI,
    entities::{Coordinate, MapAnnotation},
    error::Error,
    validation::ValidationError,
};

#[async_trait]
impl MapAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn list_annotations(&self) -> Vec<MapAnnotation> {
        self.reconciler.lock().await.annotations()
    }

    #[tracing::instrument(skip(self))]
    async fn update_user_position(&self, coordinate: Coordinate) -> Result<(), Error> {
        if !coordinate.is_valid() {
            return Err(ValidationError::MissingOrInvalidCoordinate.into());
        }

        self.reconciler.lock().await.set_user_position(coordinate);

        Ok(())
    }
}

#[tokio::test]
async fn user_position_survives_snapshots() {
    use super::{eventually, test_config};
    use crate::api::BathroomAPI;
    use crate::entities::RawInput;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    let store = Arc::new(MemoryStore::new());
    let engine = Engine::start(store.clone(), &test_config()).await.unwrap();

    engine
        .update_user_position(Coordinate::new(47.0, -122.0))
        .await
        .unwrap();

    engine
        .create_bathroom(RawInput {
            name: Some("Library".into()),
            coordinate: Some(Coordinate::new(47.1, -122.1)),
            ..RawInput::default()
        })
        .await
        .unwrap();

    let engine_ref = &engine;
    assert!(eventually(move || async move { engine_ref.list_annotations().await.len() == 2 }).await);

    let id = store.records().await[0].id.unwrap();
    store.remove(id).await.unwrap();

    assert!(eventually(move || async move { engine_ref.list_annotations().await.len() == 1 }).await);
    assert!(engine.list_annotations().await[0].is_user_position());

    engine.shutdown().await;
}

#[tokio::test]
async fn invalid_user_position_is_rejected() {
    use super::test_config;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    let engine = Engine::start(Arc::new(MemoryStore::new()), &test_config())
        .await
        .unwrap();

    let err = engine
        .update_user_position(Coordinate::new(f64::NAN, 0.0))
        .await
        .unwrap_err();

    assert_eq!(err.code, 110);
    assert!(engine.list_annotations().await.is_empty());

    engine.shutdown().await;
}
