//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::fanout::Frame;
use crate::game::{RoomHandle, SessionId};
use crate::util::rate_limit::SessionRateLimiter;
use crate::ws::protocol::ClientMsg;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let rate_limiter =
        SessionRateLimiter::new(state.config.move_rate_limit, state.config.shot_rate_limit);
    ws.on_upgrade(move |socket| handle_socket(socket, state.room, rate_limiter))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, room: RoomHandle, rate_limiter: SessionRateLimiter) {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    let frames = match room.connect(session_id).await {
        Ok(frames) => frames,
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to register session");
            return;
        }
    };

    run_session(session_id, &room, ws_sink, ws_stream, frames, rate_limiter).await;

    // Cleanup on disconnect
    if room.disconnect(session_id).await.is_err() {
        debug!(session_id = %session_id, "Room closed before disconnect");
    }

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    session_id: SessionId,
    room: &RoomHandle,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut frames: mpsc::Receiver<Frame>,
    rate_limiter: SessionRateLimiter,
) {
    // Spawn writer task: room frames -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(frame.to_string())).await {
                debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                break;
            }
        }
        debug!(session_id = %session_id, "Outbound queue closed");
    });

    // Reader loop: WebSocket -> room
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        if !rate_limiter.admit(&msg) {
                            debug!(session_id = %session_id, "Rate limited client message");
                            continue;
                        }
                        if room.send(session_id, msg).await.is_err() {
                            debug!(session_id = %session_id, "Room channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(session_id = %session_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(session_id = %session_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}
