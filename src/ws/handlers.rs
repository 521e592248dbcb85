//! WebSocket message dispatch
//!
//! Maps client messages onto calls against the room handle. Every failure
//! comes back from the room already normalised, so the handler only wraps it
//! in an error message for this client.

use crate::error::{AppError, StandardError};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::{JoinRequest, RoomHandle};
use crate::types::PlayerId;

/// Per-connection state
#[derive(Debug, Default)]
pub struct Session {
    pub player_id: Option<PlayerId>,
    pub connection_id: Option<String>,
}

fn error(err: StandardError) -> ServerMessage {
    ServerMessage::Error {
        error: err.envelope(),
    }
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    session: &mut Session,
    room: &RoomHandle,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Join {
            name,
            player_id,
            avatar,
        } => {
            if let Some(current) = &session.player_id {
                let err = AppError::Protocol(format!("already joined as {current}"));
                return Some(error(StandardError::from(err).with_context("room", room.code())));
            }

            let request = JoinRequest {
                player_id,
                name,
                avatar,
            };
            match room.join(request).await {
                Ok(ack) => {
                    session.player_id = Some(ack.player_id.clone());
                    session.connection_id = Some(ack.connection_id);
                    Some(ServerMessage::Welcome {
                        player_id: ack.player_id,
                        room_code: room.code().to_string(),
                        reconnected: ack.reconnected,
                        snapshot: ack.snapshot,
                        server_now: chrono::Utc::now().to_rfc3339(),
                    })
                }
                Err(e) => Some(error(e)),
            }
        }

        other => {
            let Some(player_id) = session.player_id.clone() else {
                let err = AppError::Protocol("join the room before acting".to_string());
                return Some(error(StandardError::from(err).with_context("room", room.code())));
            };
            let input = other.into_action()?;
            let action = input.action_type();

            match room.act(&player_id, input).await {
                Ok(()) => Some(ServerMessage::Ack { action }),
                Err(e) => Some(error(e)),
            }
        }
    }
}
