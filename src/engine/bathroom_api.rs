use super::helpers::save_with_retry;
use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::BathroomAPI,
    entities::{BathroomRecord, DisplayAnnotation, RawInput},
    error::{invalid_input_error, Error},
    validation::validate,
};

#[async_trait]
impl BathroomAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_bathroom(&self, raw: RawInput) -> Result<BathroomRecord, Error> {
        let record = validate(&raw, self.code_policy).map_err(|err| {
            tracing::info!("rejected bathroom: {}", err);
            Error::from(err)
        })?;

        // the record shows up on the map once the store echoes it back
        tokio::spawn(save_with_retry(
            self.store.clone(),
            record.clone(),
            self.retry,
        ));

        Ok(record)
    }

    #[tracing::instrument(skip(self))]
    async fn find_bathroom(&self, id: Uuid) -> Result<DisplayAnnotation, Error> {
        self.reconciler
            .lock()
            .await
            .find(&id)
            .cloned()
            .ok_or_else(invalid_input_error)
    }
}

#[cfg(test)]
fn raw(name: &str) -> RawInput {
    use crate::entities::Coordinate;

    RawInput {
        name: Some(name.into()),
        code: Some("".into()),
        notes: Some("left of the counter".into()),
        is_unisex: true,
        clean_rating: Some(9),
        bathroom_rating: Some(-1),
        coordinate: Some(Coordinate::new(47.6, -122.3)),
    }
}

#[tokio::test]
async fn created_bathroom_appears_on_the_map() {
    use super::{eventually, test_config};
    use crate::api::MapAPI;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    let store = Arc::new(MemoryStore::new());
    let engine = Engine::start(store.clone(), &test_config()).await.unwrap();

    let record = engine.create_bathroom(raw("Starbucks")).await.unwrap();
    assert_eq!(record.id, None);
    assert_eq!(record.code, None);
    assert_eq!(record.clean_rating, Some(5));
    assert_eq!(record.bathroom_rating, Some(1));

    let engine_ref = &engine;
    assert!(eventually(move || async move { engine_ref.list_annotations().await.len() == 1 }).await);

    let annotations = engine.list_annotations().await;
    let annotation = annotations[0].bathroom().unwrap();

    assert_eq!(annotation.title, "Starbucks");
    assert_eq!(annotation.subtitle, "Unisex");
    assert_eq!(annotation.notes, "left of the counter");
    assert_eq!(annotation.coordinate, record.location);

    let found = engine.find_bathroom(annotation.id).await.unwrap();
    assert_eq!(&found, annotation);

    engine.shutdown().await;
}

#[tokio::test]
async fn invalid_input_is_rejected_without_saving() {
    use super::test_config;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    let store = Arc::new(MemoryStore::new());
    let engine = Engine::start(store.clone(), &test_config()).await.unwrap();

    let err = engine.create_bathroom(raw("   ")).await.unwrap_err();
    assert_eq!(err.code, 111);

    let err = engine
        .create_bathroom(RawInput {
            coordinate: None,
            ..raw("Starbucks")
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, 110);

    tokio::task::yield_now().await;
    assert!(store.records().await.is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn required_code_policy_is_enforced() {
    use super::test_config;
    use crate::store::MemoryStore;
    use crate::validation::CodePolicy;
    use std::sync::Arc;

    let config = crate::config::Config {
        code_policy: CodePolicy::Required,
        ..test_config()
    };

    let engine = Engine::start(Arc::new(MemoryStore::new()), &config)
        .await
        .unwrap();

    let err = engine.create_bathroom(raw("Starbucks")).await.unwrap_err();
    assert_eq!(err.code, 112);

    engine.shutdown().await;
}

#[tokio::test]
async fn failed_saves_are_retried_in_the_background() {
    use super::{eventually, test_config};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    let store = Arc::new(MemoryStore::new());
    let engine = Engine::start(store.clone(), &test_config()).await.unwrap();
    store.fail_next_saves(1).await;

    engine.create_bathroom(raw("Starbucks")).await.unwrap();

    let store_ref = &store;
    assert!(eventually(move || async move { store_ref.records().await.len() == 1 }).await);

    engine.shutdown().await;
}

#[tokio::test]
async fn deleted_bathrooms_disappear() {
    use super::{eventually, test_config};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    let store = Arc::new(MemoryStore::new());
    let engine = Engine::start(store.clone(), &test_config()).await.unwrap();

    engine.create_bathroom(raw("Starbucks")).await.unwrap();

    let store_ref = &store;
    assert!(eventually(move || async move { store_ref.records().await.len() == 1 }).await);

    let id = store.records().await[0].id.unwrap();
    let engine_ref = &engine;
    assert!(eventually(move || async move { engine_ref.find_bathroom(id).await.is_ok() }).await);

    store.remove(id).await.unwrap();

    assert!(eventually(move || async move { engine_ref.find_bathroom(id).await.is_err() }).await);

    engine.shutdown().await;
}
