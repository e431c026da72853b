use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mafia::{
    config::ServerConfig,
    reaper,
    state::AppState,
    store::{JsonFileStore, MemoryStore, SessionStore},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mafia=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Mafia server...");

    let config = ServerConfig::from_env();

    let store: Arc<dyn SessionStore> = match &config.data_dir {
        Some(dir) => Arc::new(JsonFileStore::open(dir.clone()).await?),
        None => {
            tracing::warn!("MAFIA_DATA_DIR not set, sessions are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let state = Arc::new(AppState::new(config.game.clone(), store));

    // Spawn background task that unloads finished and abandoned sessions
    reaper::spawn_session_reaper(state.clone(), config.reap_interval);

    let app = mafia::router(state);

    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
