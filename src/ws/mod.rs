pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::error::{AppError, StandardError};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::{RoomHandle, RoomRegistry};
use handlers::Session;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room: String,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(registry): State<RoomRegistry>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request: room={}", params.room);

    let room = registry.get(&params.room).await;
    ws.on_upgrade(move |socket| async move {
        match room {
            Ok(room) => handle_socket(socket, room).await,
            Err(e) => reject_socket(socket, e).await,
        }
    })
}

async fn send(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            StandardError::system(format!("failed to encode message: {e}")).log();
            true
        }
    }
}

/// Tell the client why the room is unavailable, then close
async fn reject_socket(socket: WebSocket, err: AppError) {
    let (mut sender, _) = socket.split();
    let err = StandardError::from(err);
    err.log();
    let _ = send(&mut sender, &ServerMessage::Error { error: err.envelope() }).await;
    let _ = sender.send(Message::Close(None)).await;
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, room: RoomHandle) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = room.subscribe();
    let mut session = Session::default();

    tracing::info!(room = %room.code(), "WebSocket connected");

    loop {
        tokio::select! {
            // Room broadcasts
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if !send(&mut sender, &ServerMessage::from(event)).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(room = %room.code(), skipped, "Client lagging behind room events");
                    }
                    Err(RecvError::Closed) => {
                        let err = AppError::Connection(format!("room {} closed", room.code()));
                        let err = StandardError::from(err);
                        let _ = send(&mut sender, &ServerMessage::Error { error: err.envelope() }).await;
                        break;
                    }
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        let response = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handlers::handle_message(client_msg, &mut session, &room).await
                            }
                            Err(e) => {
                                let err = AppError::Protocol(format!("Invalid message format: {e}"));
                                let err = StandardError::from(err).with_context("room", room.code());
                                err.log();
                                Some(ServerMessage::Error { error: err.envelope() })
                            }
                        };

                        if let Some(response) = response {
                            if !send(&mut sender, &response).await {
                                tracing::error!("Failed to send response");
                                break;
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
                        StandardError::from(AppError::Connection(e.to_string()))
                            .with_context("room", room.code())
                            .log();
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    if let (Some(player_id), Some(connection_id)) = (session.player_id, session.connection_id) {
        // Room may already be gone
        let _ = room.leave(&player_id, &connection_id).await;
    }
    tracing::info!(room = %room.code(), "WebSocket connection closed");
}
