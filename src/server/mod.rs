mod handlers;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post, put},
    Router,
};

use crate::api::API;
use crate::error::{unexpected_error, Error};
use crate::server::handlers::{annotations, bathrooms};

pub type DynAPI = Arc<dyn API + Send + Sync>;

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/bathrooms", post(bathrooms::create))
        .route("/bathrooms/:id", get(bathrooms::find))
        .route("/annotations", get(annotations::list))
        .route("/user_position", put(annotations::update_user_position))
        .layer(Extension(api))
}

pub async fn serve<F>(api: DynAPI, addr: SocketAddr, shutdown: F) -> Result<(), Error>
where
    F: Future<Output = ()>,
{
    let app = router(api);

    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| {
            tracing::error!("server error: {}", err);
            unexpected_error()
        })
}
