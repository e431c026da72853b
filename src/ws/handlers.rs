//! WebSocket message dispatch
//!
//! Each connection carries a `Connection` binding. Joining a session binds the
//! connection to that participant; every in-game command acts as the bound
//! participant, so a client can never vote on someone else's behalf.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{ParticipantId, SessionCode};
use std::sync::Arc;

use super::{lobby, play};

/// What a socket is attached to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Connection {
    /// Session whose events this connection receives
    pub code: Option<SessionCode>,
    /// Participant this connection acts as (None = observer)
    pub participant: Option<ParticipantId>,
}

impl Connection {
    pub fn observer(code: SessionCode) -> Self {
        Self {
            code: Some(code),
            participant: None,
        }
    }
}

/// Return early with an error unless the connection is attached to a session
macro_rules! require_session {
    ($conn:expr) => {
        match &$conn.code {
            Some(code) => code.clone(),
            None => {
                return Some(ServerMessage::Error {
                    code: "NOT_IN_SESSION".to_string(),
                    msg: "Create or join a session first".to_string(),
                })
            }
        }
    };
}

/// Return early with an error unless the connection has joined as a participant
macro_rules! require_participant {
    ($conn:expr) => {
        match (&$conn.code, &$conn.participant) {
            (Some(code), Some(id)) => (code.clone(), id.clone()),
            _ => {
                return Some(ServerMessage::Error {
                    code: "NOT_JOINED".to_string(),
                    msg: "Only joined participants can do that".to_string(),
                })
            }
        }
    };
}

/// Fresh snapshot for a connection that missed events. The view carries the
/// participant's own role, so a dropped role message is recovered too.
pub async fn resync(conn: &Connection, state: &Arc<AppState>) -> Option<ServerMessage> {
    let code = conn.code.as_deref()?;
    match state.view(code, conn.participant.as_deref()).await {
        Ok(session) => Some(ServerMessage::Session { session }),
        Err(e) => Some(e.into()),
    }
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    conn: &mut Connection,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        // Lobby
        ClientMessage::CreateSession { created_by } => {
            lobby::handle_create_session(state, conn, created_by).await
        }

        ClientMessage::Join { code, username } => {
            lobby::handle_join(state, conn, code, username).await
        }

        ClientMessage::Start => {
            let code = require_session!(conn);
            lobby::handle_start(state, &code).await
        }

        ClientMessage::Cancel => {
            let code = require_session!(conn);
            lobby::handle_cancel(state, &code).await
        }

        // In-game actions
        ClientMessage::DayVote { target } => {
            let (code, voter) = require_participant!(conn);
            play::handle_day_vote(state, &code, &voter, target).await
        }

        ClientMessage::NightAction { target, kind } => {
            let (code, actor) = require_participant!(conn);
            play::handle_night_action(state, &code, &actor, target, kind).await
        }

        // Reads
        ClientMessage::GetSession { code } => play::handle_get_session(state, conn, code).await,

        ClientMessage::GetHistory { code } => play::handle_get_history(state, code).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GameConfig, NightActionKind};

    fn state() -> Arc<AppState> {
        Arc::new(AppState::in_memory(GameConfig::default()))
    }

    fn error_code(msg: Option<ServerMessage>) -> String {
        match msg {
            Some(ServerMessage::Error { code, .. }) => code,
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_actions_require_binding() {
        let state = state();
        let mut conn = Connection::default();

        let result = handle_message(ClientMessage::Start, &mut conn, &state).await;
        assert_eq!(error_code(result), "NOT_IN_SESSION");

        let result =
            handle_message(ClientMessage::DayVote { target: None }, &mut conn, &state).await;
        assert_eq!(error_code(result), "NOT_JOINED");
    }

    #[tokio::test]
    async fn test_observer_cannot_act() {
        let state = state();
        let code = state.create_session(None).await.unwrap();
        let mut conn = Connection::observer(code);

        let result = handle_message(
            ClientMessage::NightAction {
                target: "someone".to_string(),
                kind: NightActionKind::Kill,
            },
            &mut conn,
            &state,
        )
        .await;
        assert_eq!(error_code(result), "NOT_JOINED");
    }

    #[tokio::test]
    async fn test_create_then_join_binds_connection() {
        let state = state();
        let mut host = Connection::default();
        let code = match handle_message(
            ClientMessage::CreateSession {
                created_by: Some("host".to_string()),
            },
            &mut host,
            &state,
        )
        .await
        {
            Some(ServerMessage::SessionCreated { code }) => code,
            other => panic!("Expected SessionCreated, got {:?}", other),
        };
        assert_eq!(host.code.as_deref(), Some(code.as_str()));
        assert!(host.participant.is_none());

        let mut player = Connection::default();
        let result = handle_message(
            ClientMessage::Join {
                code: code.to_lowercase(),
                username: "alice".to_string(),
            },
            &mut player,
            &state,
        )
        .await;
        match result {
            Some(ServerMessage::Joined {
                code: joined,
                participant_id,
            }) => {
                assert_eq!(joined, code);
                assert_eq!(player.participant, Some(participant_id));
                assert_eq!(player.code, Some(code.clone()));
            }
            other => panic!("Expected Joined, got {:?}", other),
        }

        // Same name again is rejected with a stable code
        let mut other = Connection::default();
        let result = handle_message(
            ClientMessage::Join {
                code: code.clone(),
                username: "alice".to_string(),
            },
            &mut other,
            &state,
        )
        .await;
        assert_eq!(error_code(result), "USERNAME_TAKEN");
        assert_eq!(other, Connection::default());
    }

    #[tokio::test]
    async fn test_start_without_enough_players() {
        let state = state();
        let mut conn = Connection::default();
        handle_message(
            ClientMessage::CreateSession { created_by: None },
            &mut conn,
            &state,
        )
        .await;

        let result = handle_message(ClientMessage::Start, &mut conn, &state).await;
        assert_eq!(error_code(result), "NOT_ENOUGH_PLAYERS");
    }

    #[tokio::test]
    async fn test_unknown_session_read() {
        let state = state();
        let mut conn = Connection::default();
        let result = handle_message(
            ClientMessage::GetHistory {
                code: "QQQQQQ".to_string(),
            },
            &mut conn,
            &state,
        )
        .await;
        assert_eq!(error_code(result), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_resync_restores_own_role() {
        let state = state();
        assert!(resync(&Connection::default(), &state).await.is_none());

        let code = state.create_session(None).await.unwrap();
        let mut seats = Vec::new();
        for i in 0..4 {
            let p = state.join(&code, &format!("player{}", i)).await.unwrap();
            seats.push(Connection {
                code: Some(code.clone()),
                participant: Some(p.id),
            });
        }
        state.start(&code).await.unwrap();

        for conn in &seats {
            match resync(conn, &state).await {
                Some(ServerMessage::Session { session }) => {
                    let me = session
                        .participants
                        .iter()
                        .find(|p| Some(&p.id) == conn.participant.as_ref())
                        .unwrap();
                    assert!(me.role.is_some());
                }
                other => panic!("Expected Session, got {:?}", other),
            }
        }

        match resync(&Connection::observer(code), &state).await {
            Some(ServerMessage::Session { session }) => {
                assert!(session.participants.iter().all(|p| p.role.is_none()));
            }
            other => panic!("Expected Session, got {:?}", other),
        }
    }
}
