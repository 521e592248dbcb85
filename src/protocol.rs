use crate::engine::RoomSnapshot;
use crate::error::ErrorEnvelope;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First message on a socket; `player_id` reconnects a known seat
    Join {
        name: String,
        player_id: Option<PlayerId>,
        avatar: Option<String>,
    },
    Start,
    SubmitAnswer {
        text: String,
    },
    SubmitVote {
        answer_id: AnswerId,
    },
}

impl ClientMessage {
    /// Game action carried by this message, if any
    pub fn into_action(self) -> Option<ActionInput> {
        match self {
            ClientMessage::Join { .. } => None,
            ClientMessage::Start => Some(ActionInput::Start),
            ClientMessage::SubmitAnswer { text } => Some(ActionInput::SubmitAnswer { text }),
            ClientMessage::SubmitVote { answer_id } => Some(ActionInput::SubmitVote { answer_id }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        player_id: PlayerId,
        room_code: RoomCode,
        reconnected: bool,
        snapshot: RoomSnapshot,
        server_now: String,
    },
    Event {
        event: GameEvent,
    },
    /// Action accepted; resulting state arrives as events
    Ack {
        action: ActionType,
    },
    Error {
        error: ErrorEnvelope,
    },
}

impl From<GameEvent> for ServerMessage {
    fn from(event: GameEvent) -> Self {
        ServerMessage::Event { event }
    }
}
