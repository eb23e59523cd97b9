use axum::extract::{Extension, Json};
use axum::http::StatusCode;

use crate::entities::{Coordinate, MapAnnotation};
use crate::error::Error;
use crate::server::DynAPI;

pub async fn list(Extension(api): Extension<DynAPI>) -> Json<Vec<MapAnnotation>> {
    api.list_annotations().await.into()
}

pub async fn update_user_position(
    Extension(api): Extension<DynAPI>,
    Json(coordinate): Json<Coordinate>,
) -> Result<StatusCode, Error> {
    api.update_user_position(coordinate).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[tokio::test]
async fn user_position_is_listed() {
    use crate::engine::Engine;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    let engine = Arc::new(
        Engine::start(Arc::new(MemoryStore::new()), &Default::default())
            .await
            .unwrap(),
    );
    let api = engine.clone() as DynAPI;

    let status = update_user_position(Extension(api.clone()), Json(Coordinate::new(1.0, 2.0)))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let Json(annotations) = list(Extension(api)).await;
    assert_eq!(
        annotations,
        vec![MapAnnotation::UserPosition(Coordinate::new(1.0, 2.0))]
    );

    engine.shutdown().await;
}
