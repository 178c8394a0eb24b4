use std::sync::Arc;

use parcel_server::{AppState, ParcelStore, ServerConfig, router};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let config = ServerConfig::from_env()?;

    let store = ParcelStore::open(&config.db_path, config.pool_size)
        .map_err(|e| format!("failed to open {}: {e}", config.db_path.display()))?;
    match store.count() {
        Ok(n) => info!("{n} parcels available"),
        Err(err) => error!("parcel count failed: {err}"),
    }

    let state = AppState {
        store: Arc::new(store),
        limits: config.limits,
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", config.addr))?;
    info!("parcel server listening on http://{}", config.addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server error: {e}"))
}
