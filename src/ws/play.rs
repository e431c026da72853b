//! In-game handlers: Day ballots, night actions and read-only queries.

use crate::game::setup::normalize_code;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{DayChoice, NightActionKind, ParticipantId};
use std::sync::Arc;

use super::handlers::Connection;

pub async fn handle_day_vote(
    state: &Arc<AppState>,
    code: &str,
    voter: &str,
    target: Option<ParticipantId>,
) -> Option<ServerMessage> {
    let choice = match target {
        Some(target) => DayChoice::Target(target),
        None => DayChoice::Skip,
    };

    match state.day_vote(code, voter, choice).await {
        Ok(()) => Some(ServerMessage::Ack),
        Err(e) => {
            tracing::warn!("Day vote by {} in {} rejected: {}", voter, code, e);
            Some(e.into())
        }
    }
}

pub async fn handle_night_action(
    state: &Arc<AppState>,
    code: &str,
    actor: &str,
    target: ParticipantId,
    kind: NightActionKind,
) -> Option<ServerMessage> {
    match state.night_action(code, actor, &target, kind).await {
        Ok(()) => Some(ServerMessage::Ack),
        Err(e) => {
            tracing::warn!("{:?} by {} in {} rejected: {}", kind, actor, code, e);
            Some(e.into())
        }
    }
}

/// Snapshot as seen by this connection. Observers of nothing in particular
/// start following the requested session.
pub async fn handle_get_session(
    state: &Arc<AppState>,
    conn: &mut Connection,
    code: String,
) -> Option<ServerMessage> {
    let code = normalize_code(&code);
    let viewer = if conn.code.as_deref() == Some(code.as_str()) {
        conn.participant.clone()
    } else {
        None
    };

    match state.view(&code, viewer.as_deref()).await {
        Ok(session) => {
            if conn.code.is_none() {
                *conn = Connection::observer(code);
            }
            Some(ServerMessage::Session { session })
        }
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_get_history(state: &Arc<AppState>, code: String) -> Option<ServerMessage> {
    match state.history(&code).await {
        Ok(entries) => Some(ServerMessage::History { entries }),
        Err(e) => Some(e.into()),
    }
}
