//! Per-connection WebSocket handling.
//!
//! Grounded on the split sender/receive-task pair in the teacher's
//! `message_relay::handle_server_logic`/`handle_client_logic`: one task
//! drains an internal channel into the socket, the other reads the socket
//! and feeds the dispatcher, and whichever finishes first aborts its twin.
//! The teacher forwards opaque bytes between a host and its clients; here
//! both directions carry typed JSON, since the server itself interprets
//! every verb instead of relaying it untouched.

use crate::dispatcher::{self, Identity};
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use protocol::{ClientMessage, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Matches the teacher's `CHANNEL_BUFFER_SIZE`: how many outbound messages a
/// connection may have buffered before `alert_board_changes`/
/// `alert_player_changes` give up on it as unhealthy (those sends are
/// non-blocking `try_send`, so a full channel never stalls the room).
const CHANNEL_BUFFER_SIZE: usize = 256;

pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(CHANNEL_BUFFER_SIZE);

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(err) => {
                    tracing::error!(?err, "failed to serialize outbound message");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                return "client disconnected";
            }
        }
        "outbound channel closed"
    });

    let identity_holder = Arc::new(std::sync::Mutex::new(Identity::default()));
    let recv_identity = identity_holder.clone();
    let recv_state = state.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(frame) = ws_receiver.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(_) => return "connection lost",
            };
            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => return "client closed connection",
                _ => continue,
            };

            let client_message: ClientMessage = match serde_json::from_str(&text) {
                Ok(message) => message,
                Err(err) => {
                    tracing::warn!(?err, "malformed client message");
                    let _ = outbound_tx
                        .send(ServerMessage::Error {
                            message: format!("malformed request: {err}"),
                        })
                        .await;
                    continue;
                }
            };

            if matches!(client_message, ClientMessage::Unknown) {
                tracing::warn!(raw = %text, "unknown verb, dropping");
                continue;
            }

            let mut identity = recv_identity.lock().unwrap().clone();
            let reply = dispatcher::dispatch(&recv_state, &mut identity, &outbound_tx, client_message).await;
            *recv_identity.lock().unwrap() = identity;

            if outbound_tx.send(reply).await.is_err() {
                return "outbound channel closed";
            }
        }
        "connection lost"
    });

    let reason = tokio::select! {
        res = &mut send_task => { receive_task.abort(); res },
        res = &mut receive_task => { send_task.abort(); res },
    }
    .unwrap_or("internal panic in connection task");

    tracing::info!(reason, "connection closed");

    let identity = identity_holder.lock().unwrap().clone();
    if let (Some(room_id), Some(user_id)) = (identity.room_id, identity.user_id) {
        if let Some(room_lock) = state.get_room(&room_id).await {
            let mut room = room_lock.lock().await;
            room.clear_transport(&user_id);
            room.alert_player_changes().await;
        }
    }
}
