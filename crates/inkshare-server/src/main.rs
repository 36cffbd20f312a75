//! Entry point for the InkShare relay server.

use anyhow::Context;
use clap::Parser;
use inkshare_core::{FileStorage, SessionStore};
use inkshare_server::auth::JwtVerifier;
use inkshare_server::config::Config;
use inkshare_server::{flush, ws, SyncEngine};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkshare_server=info,inkshare_core=info,tower_http=info".into()),
        )
        .init();

    let config = Config::parse();

    let storage = match &config.data_dir {
        Some(dir) => FileStorage::new(dir.clone()),
        None => FileStorage::default_location(),
    }
    .context("failed to open session storage")?;
    info!("Session storage at {}", storage.base_path().display());

    let store: Arc<dyn SessionStore> = Arc::new(storage);
    let verifier = Arc::new(JwtVerifier::new(config.secret.as_bytes()));
    let engine = Arc::new(SyncEngine::new(store, verifier));

    flush::spawn_flush_task(engine.clone(), config.flush_interval());

    let app = ws::router(engine);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("InkShare relay server listening on {}", config.bind);
    info!("WebSocket endpoint: ws://{}/ws", config.bind);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
