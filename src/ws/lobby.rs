//! Lobby handlers: creating, joining, starting and cancelling sessions.

use crate::game::setup::normalize_code;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use std::sync::Arc;

use super::handlers::Connection;

pub async fn handle_create_session(
    state: &Arc<AppState>,
    conn: &mut Connection,
    created_by: Option<String>,
) -> Option<ServerMessage> {
    match state.create_session(created_by).await {
        Ok(code) => {
            *conn = Connection::observer(code.clone());
            Some(ServerMessage::SessionCreated { code })
        }
        Err(e) => {
            tracing::error!("Failed to create session: {}", e);
            Some(e.into())
        }
    }
}

pub async fn handle_join(
    state: &Arc<AppState>,
    conn: &mut Connection,
    code: String,
    username: String,
) -> Option<ServerMessage> {
    let code = normalize_code(&code);
    tracing::info!("Join request for {} as {}", code, username);

    match state.join(&code, &username).await {
        Ok(participant) => {
            *conn = Connection {
                code: Some(code.clone()),
                participant: Some(participant.id.clone()),
            };
            Some(ServerMessage::Joined {
                code,
                participant_id: participant.id,
            })
        }
        Err(e) => {
            tracing::warn!("Join to {} rejected: {}", code, e);
            Some(e.into())
        }
    }
}

pub async fn handle_start(state: &Arc<AppState>, code: &str) -> Option<ServerMessage> {
    match state.start(code).await {
        Ok(()) => Some(ServerMessage::Ack),
        Err(e) => {
            tracing::warn!("Start of {} rejected: {}", code, e);
            Some(e.into())
        }
    }
}

pub async fn handle_cancel(state: &Arc<AppState>, code: &str) -> Option<ServerMessage> {
    match state.cancel(code).await {
        Ok(()) => Some(ServerMessage::Ack),
        Err(e) => {
            tracing::warn!("Cancel of {} rejected: {}", code, e);
            Some(e.into())
        }
    }
}
