// Public API for integration tests and potential library usage

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod game;
pub mod protocol;
pub mod reaper;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// All HTTP and WebSocket routes over the given state
pub fn router(state: Arc<state::AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/sessions/{code}", get(api::get_session))
        .route("/api/sessions/{code}/history", get(api::get_history))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
