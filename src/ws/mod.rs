pub mod handlers;
mod lobby;
mod play;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::game::setup::normalize_code;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use handlers::Connection;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Follow a session's public events right away
    pub code: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request: code={:?}", params.code);

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut conn = match params.code {
        Some(code) => Connection::observer(normalize_code(&code)),
        None => Connection::default(),
    };

    // Every session's events; filtered per connection below
    let mut events_rx = state.subscribe();

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                match event {
                    Ok(envelope) => {
                        let Some(code) = conn.code.as_deref() else { continue };
                        if !envelope.is_visible_to(code, conn.participant.as_deref()) {
                            continue;
                        }
                        let msg = ServerMessage::Event {
                            code: envelope.code,
                            event: envelope.event,
                        };
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "WebSocket client lagged, {} events dropped, resyncing",
                            skipped
                        );
                        if let Some(snapshot) = handlers::resync(&conn, &state).await {
                            if let Ok(json) = serde_json::to_string(&snapshot) {
                                if sender.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        let response = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handlers::handle_message(client_msg, &mut conn, &state).await
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                Some(ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                })
                            }
                        };

                        if let Some(response) = response {
                            if let Ok(json) = serde_json::to_string(&response) {
                                if sender.send(Message::Text(json.into())).await.is_err() {
                                    tracing::error!("Failed to send response");
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!(
        "WebSocket connection closed (session={:?}, participant={:?})",
        conn.code,
        conn.participant
    );
}
