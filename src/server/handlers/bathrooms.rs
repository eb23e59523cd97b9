use axum::extract::{Extension, Json, Path};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{BathroomRecord, DisplayAnnotation, RawInput};
use crate::error::Error;
use crate::server::DynAPI;

#[derive(Debug, Serialize, Deserialize)]
pub struct FindResponse {
    #[serde(flatten)]
    annotation: DisplayAnnotation,
    details: String,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Json(raw): Json<RawInput>,
) -> Result<(StatusCode, Json<BathroomRecord>), Error> {
    let record = api.create_bathroom(raw).await?;

    Ok((StatusCode::CREATED, record.into()))
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<FindResponse>, Error> {
    let annotation = api.find_bathroom(id).await?;
    let details = annotation.details();

    Ok(FindResponse {
        annotation,
        details,
    }
    .into())
}

#[tokio::test]
async fn create_and_find_through_handlers() {
    use crate::engine::Engine;
    use crate::entities::Coordinate;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    let engine = Arc::new(
        Engine::start(Arc::new(MemoryStore::new()), &Default::default())
            .await
            .unwrap(),
    );
    let api = engine.clone() as DynAPI;

    let raw = RawInput {
        name: Some("Starbucks".into()),
        code: Some("1234".into()),
        coordinate: Some(Coordinate::new(47.6, -122.3)),
        ..RawInput::default()
    };

    let (status, Json(record)) = create(Extension(api.clone()), Json(raw)).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record.code.as_deref(), Some("1234"));

    let mut found = None;
    for _ in 0..200 {
        if let Some(annotation) = api
            .list_annotations()
            .await
            .iter()
            .find_map(|annotation| annotation.bathroom().cloned())
        {
            found = Some(annotation);
            break;
        }

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    let annotation = found.unwrap();

    let Json(response) = find(Extension(api.clone()), Path(annotation.id))
        .await
        .unwrap();
    assert_eq!(response.annotation.title, "Starbucks");
    assert!(response.details.contains("Code: 1234"));

    let err = find(Extension(api), Path(Uuid::new_v4())).await.unwrap_err();
    assert!(err.is_invalid_input_error());

    engine.shutdown().await;
}
