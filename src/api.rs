//! Read-only HTTP endpoints.
//!
//! Everything that changes a session goes over the WebSocket; these exist for
//! lobby pages and post-game summaries.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    /// Participant whose own role should be included
    pub viewer: Option<String>,
}

fn error_response(e: GameError) -> Response {
    let status = match e {
        GameError::SessionNotFound(_) | GameError::ParticipantNotFound(_) => StatusCode::NOT_FOUND,
        GameError::Storage(_) | GameError::SessionClosed(_) => {
            tracing::error!("Session lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(ServerMessage::from(e))).into_response()
}

/// Session snapshot.
///
/// GET /api/sessions/{code}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Response {
    match state.view(&code, query.viewer.as_deref()).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => error_response(e),
    }
}

/// Session history: the public trail while running, everything once finished.
///
/// GET /api/sessions/{code}/history
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Response {
    match state.history(&code).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => error_response(e),
    }
}
