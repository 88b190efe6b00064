//! services/api/src/web/ws_handler.rs
//!
//! The live session feed. One WebSocket connection per operator dashboard:
//! it subscribes to the broadcast channel (map frames, attendance marks,
//! session lifecycle) and accepts map interactions (marker drags, clicks)
//! that move the operator's draft geofence.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{Sink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    info!("New WebSocket connection established for user: {}", user_id);

    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the init handshake so no event published during the
    // handshake is missed.
    let mut events = app_state.events.subscribe();

    // --- 1. Initialization Phase ---
    let session_id = match receiver.next().await {
        Some(Ok(Message::Text(init_json))) => {
            match serde_json::from_str::<ClientMessage>(&init_json) {
                Ok(ClientMessage::Init { session_id }) => {
                    let exists = app_state
                        .registry
                        .read()
                        .unwrap()
                        .session(session_id)
                        .is_ok();
                    if !exists {
                        let err_msg = ServerMessage::Error {
                            message: "Unknown session.".to_string(),
                        };
                        send_message(&mut sender, &err_msg).await;
                        return;
                    }
                    session_id
                }
                _ => {
                    error!("First message was not a valid Init message.");
                    return;
                }
            }
        }
        _ => {
            error!("Client disconnected before sending Init message.");
            return;
        }
    };

    info!("Feed initialized for session: {}", session_id);
    let init_msg = ServerMessage::SessionInitialized { session_id };
    if !send_message(&mut sender, &init_msg).await {
        return;
    }

    // --- 2. Main Loop ---
    loop {
        tokio::select! {
            // Forward broadcast events to this client.
            event = events.recv() => {
                match event {
                    Ok(msg) => {
                        // Map frames from other operators' drafts are not
                        // this feed's to render.
                        if !frame_is_for(&msg, user_id) {
                            continue;
                        }
                        if !send_message(&mut sender, &msg).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // A slow client missed some frames; the next
                        // presence query resynchronizes it.
                        warn!("Feed for session {} lagged by {} events", session_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            // Handle map interactions from the client.
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(json))) => {
                        match serde_json::from_str::<ClientMessage>(&json) {
                            Ok(ClientMessage::MarkerDragged { latitude, longitude })
                            | Ok(ClientMessage::MapClicked { latitude, longitude }) => {
                                // Moving the draft center pushes fresh map
                                // frames back through the broadcast channel.
                                let map = app_state.map_for(user_id);
                                app_state.with_draft(user_id, |draft| {
                                    draft.set_center_from_map(latitude, longitude, &map);
                                });
                            }
                            Ok(ClientMessage::Init { .. }) => {
                                warn!("Ignoring duplicate Init message.");
                            }
                            Err(e) => {
                                warn!("Unparseable client message: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ignore pings, pongs and binary frames.
                    Some(Err(e)) => {
                        error!("WebSocket receive error: {:?}", e);
                        break;
                    }
                }
            }
        }
    }

    info!("WebSocket connection closed for user: {}", user_id);
}

/// Whether a broadcast frame belongs on the feed of `user_id`. Map frames
/// are scoped to the operator whose draft emitted them; everything else
/// (attendance marks, session lifecycle) goes to every feed.
fn frame_is_for(msg: &ServerMessage, user_id: Uuid) -> bool {
    match msg {
        ServerMessage::MapView { operator_id, .. }
        | ServerMessage::MapMarker { operator_id, .. }
        | ServerMessage::MapCircle { operator_id, .. } => *operator_id == user_id,
        _ => true,
    }
}

/// Serializes and sends one message, returning false when the client is gone.
async fn send_message(
    sender: &mut (impl Sink<Message, Error = axum::Error> + Unpin),
    msg: &ServerMessage,
) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {:?}", e);
            return false;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_frames_are_scoped_to_their_operator() {
        let me = Uuid::new_v4();
        let someone_else = Uuid::new_v4();

        let mine = ServerMessage::MapMarker {
            operator_id: me,
            latitude: 0.0,
            longitude: 0.0,
        };
        let theirs = ServerMessage::MapCircle {
            operator_id: someone_else,
            latitude: 0.0,
            longitude: 0.0,
            radius_meters: 100.0,
        };

        assert!(frame_is_for(&mine, me));
        assert!(!frame_is_for(&theirs, me));
    }

    #[test]
    fn session_wide_events_reach_every_feed() {
        let me = Uuid::new_v4();
        let ended = ServerMessage::SessionEnded {
            session_id: Uuid::new_v4(),
        };
        assert!(frame_is_for(&ended, me));
    }
}
