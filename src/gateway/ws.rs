//! WebSocket transport for the connection gateway
//!
//! Each upgraded socket gets a fresh session id and an unbounded outbound
//! channel registered with the hub. A pusher task drains that channel onto
//! the socket while the connection task parses inbound frames and feeds
//! them to the gateway. When either side stops, the session is treated as
//! disconnected.

use crate::gateway::events::{InboundEvent, OutboundEvent};
use crate::gateway::hub::Broadcaster;
use crate::service::app::AppState;
use crate::utils::generate_session_id;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drain the session's outbound channel onto the socket
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<OutboundEvent>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(error) => {
                    warn!("Failed to serialize outbound event: {error}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = generate_session_id();
    let (tx, rx) = mpsc::unbounded_channel();
    if state.hub().register_session(&session_id, tx).is_err() {
        warn!("Failed to register session {session_id}; dropping socket");
        return;
    }
    state
        .metrics()
        .set_connected_sessions(state.hub().session_count() as i64);
    info!("Session {session_id} connected");

    let (sender, mut receiver) = socket.split();
    let send_task = pusher_loop(rx, sender);
    let mut conn = crate::gateway::handler::ConnectionState::new(session_id.clone());

    while let Some(frame) = receiver.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(error) => {
                debug!("WebSocket error for session {session_id}: {error}");
                break;
            }
        };
        match frame {
            Message::Text(text) => match serde_json::from_str::<InboundEvent>(&text) {
                Ok(event) => state.gateway().handle_event(&mut conn, event),
                Err(error) => {
                    debug!("Malformed event from session {session_id}: {error}");
                    state.hub().send_to(
                        &session_id,
                        OutboundEvent::Error {
                            reason: format!("Malformed event: {error}"),
                        },
                    );
                }
            },
            Message::Close(_) => {
                debug!("Session {session_id} requested close");
                break;
            }
            // Ping/pong is handled by the protocol layer.
            _ => {}
        }
    }

    send_task.abort();
    state.gateway().handle_disconnect(&conn);
    state
        .metrics()
        .set_connected_sessions(state.hub().session_count() as i64);
}
