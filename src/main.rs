use std::sync::Arc;

use scoreboard_server::api::middleware::cors;
use scoreboard_server::api::server::{self, AppState};
use scoreboard_server::db::prelude::{EventStore, MemoryStore};
use scoreboard_server::db::seed::{SeedError, SeedFile};
use scoreboard_server::hub::prelude::Hub;
use scoreboard_server::util::env::{Config, ConfigError};
use scoreboard_server::util::telemetry::{Telemetry, TelemetryError};
use thiserror::Error;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Seed(#[from] SeedError),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(ConfigError::Args(e)) => e.exit(),
        Err(e) => return Err(e.into()),
    };

    let telemetry = Telemetry::new(&config)?.register()?;
    tracing::info!(port = config.port, "starting scoreboard server");

    let store: Arc<dyn EventStore> = Arc::new(MemoryStore::new());
    if let Some(path) = &config.seed_file {
        let events = SeedFile::read(path).await?.apply(store.as_ref()).await?;
        for event in &events {
            tracing::info!(slug = %event.slug, name = %event.name, "event available");
        }
    }

    let (hub, hub_task) = Hub::spawn(config.hub_config());
    let state = Arc::new(AppState::new(
        store,
        hub.clone(),
        config.internal_token.clone(),
    ));

    let app = server::router(state, cors(config.cors_origins()));
    let listener = server::bind(config.port).await?;
    let served = server::serve(listener, app, server::shutdown_signal()).await;

    // closes every subscriber queue so upgraded sockets send a close frame and exit
    hub.shutdown().await;
    if let Err(e) = hub_task.await {
        tracing::error!(error = ?e, "broadcast hub task failure");
    }

    tracing::info!("server stopped");
    telemetry.shutdown();

    Ok(served?)
}
