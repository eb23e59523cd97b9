use std::sync::Arc;

use restroom_runner::config::Config;
use restroom_runner::engine::Engine;
use restroom_runner::error::Error;
use restroom_runner::server::{serve, DynAPI};
use restroom_runner::store::{DynStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    let store: DynStore = match &config.database_url {
        Some(url) => Arc::new(PgStore::connect(url, config.max_connections, config.retry).await?),
        None => {
            tracing::warn!("DATABASE_URL is not set, bathrooms will only be kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let engine = Arc::new(Engine::start(store, &config).await?);

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for shutdown signal: {}", err);
        }
    };

    let result = serve(engine.clone() as DynAPI, config.bind_addr, shutdown).await;

    engine.shutdown().await;

    result
}
