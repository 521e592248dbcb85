use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type AnswerId = String;
pub type PromptId = String;
pub type RoomCode = String;

/// The seven phases of a room, in lifecycle order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Lobby,
    Prompt,
    Choose,
    Reveal,
    Scoring,
    RoundEnd,
    GameOver,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Lobby,
        Phase::Prompt,
        Phase::Choose,
        Phase::Reveal,
        Phase::Scoring,
        Phase::RoundEnd,
        Phase::GameOver,
    ];

    /// Wire name, e.g. `round-end`
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Lobby => "lobby",
            Phase::Prompt => "prompt",
            Phase::Choose => "choose",
            Phase::Reveal => "reveal",
            Phase::Scoring => "scoring",
            Phase::RoundEnd => "round-end",
            Phase::GameOver => "game-over",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub connected: bool,
    /// Cumulative across rounds
    pub score: i64,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: None,
            connected: true,
            score: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub player_id: PlayerId,
    pub text: String,
}

/// Prompt content drawn from the engine's deck
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptCard {
    pub id: PromptId,
    pub text: String,
}

impl PromptCard {
    pub fn new(id: impl Into<PromptId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Round {
    pub round_number: u32,
    pub prompt_id: PromptId,
    pub prompt: String,
    pub answers: BTreeMap<AnswerId, Answer>,
    /// voter -> answer voted for
    pub votes: BTreeMap<PlayerId, AnswerId>,
    pub time_left_ms: u64,
    pub phase: Phase,
    /// The true answer; every other answer is a bluff
    pub correct_answer_id: Option<AnswerId>,
    /// Player whose submission becomes the true answer this round
    pub truth_teller: Option<PlayerId>,
    /// Set once scores have been applied (for idempotency)
    pub scored_at: Option<DateTime<Utc>>,
}

impl Round {
    pub fn answer_of(&self, player_id: &str) -> Option<(&AnswerId, &Answer)> {
        self.answers.iter().find(|(_, a)| a.player_id == player_id)
    }

    /// Vote count per answer id
    pub fn vote_counts(&self) -> BTreeMap<AnswerId, u32> {
        let mut counts = BTreeMap::new();
        for answer_id in self.votes.values() {
            *counts.entry(answer_id.clone()).or_insert(0) += 1;
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameState {
    pub phase: Phase,
    pub players: Vec<Player>,
    pub round: u32,
    pub max_rounds: u32,
    pub time_left_ms: u64,
    /// Summary mirror of `players[].score`
    pub scores: BTreeMap<PlayerId, i64>,
    pub current_round: Option<Round>,
    pub is_round_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub phase_start_time: DateTime<Utc>,
}

impl GameState {
    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    /// The host is the first seated player
    pub fn host_id(&self) -> Option<&PlayerId> {
        self.players.first().map(|p| &p.id)
    }

    pub fn connected_count(&self) -> usize {
        self.players.iter().filter(|p| p.connected).count()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Start,
    SubmitAnswer,
    SubmitVote,
}

/// Action payload, one variant per action kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionInput {
    Start,
    SubmitAnswer { text: String },
    #[serde(rename_all = "camelCase")]
    SubmitVote { answer_id: AnswerId },
}

impl ActionInput {
    pub fn action_type(&self) -> ActionType {
        match self {
            ActionInput::Start => ActionType::Start,
            ActionInput::SubmitAnswer { .. } => ActionType::SubmitAnswer,
            ActionInput::SubmitVote { .. } => ActionType::SubmitVote,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub player_id: PlayerId,
    pub input: ActionInput,
    pub timestamp: DateTime<Utc>,
}

impl Action {
    pub fn new(player_id: impl Into<PlayerId>, input: ActionInput) -> Self {
        Self {
            player_id: player_id.into(),
            input,
            timestamp: Utc::now(),
        }
    }

    pub fn action_type(&self) -> ActionType {
        self.input.action_type()
    }
}

/// One player's line on the leaderboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub player_id: PlayerId,
    pub name: String,
    pub score: i64,
}

/// Points earned by one player in one round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RoundScore {
    pub player_id: PlayerId,
    pub truth_bonus: i64,
    pub vote_points: i64,
    pub total: i64,
}

/// Informational record for observers; never mutates state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum GameEvent {
    #[serde(rename_all = "camelCase")]
    Prompt {
        round: u32,
        prompt_id: PromptId,
        prompt: String,
        truth_teller: Option<PlayerId>,
        time_left_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    Submitted {
        player_id: PlayerId,
        kind: ActionType,
    },
    RoomUpdate(crate::engine::RoomSnapshot),
    #[serde(rename_all = "camelCase")]
    PhaseChange {
        phase: Phase,
        round: u32,
        time_left_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    Scores {
        round: u32,
        breakdown: Vec<RoundScore>,
        standings: Vec<Standing>,
    },
    #[serde(rename_all = "camelCase")]
    RoundEnd {
        round: u32,
        correct_answer_id: Option<AnswerId>,
    },
    GameOver {
        standings: Vec<Standing>,
    },
    PlayerJoined(Player),
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        player_id: PlayerId,
    },
}

impl GameEvent {
    /// Wire tag of this event
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::Prompt { .. } => "prompt",
            GameEvent::Submitted { .. } => "submitted",
            GameEvent::RoomUpdate(_) => "roomUpdate",
            GameEvent::PhaseChange { .. } => "phaseChange",
            GameEvent::Scores { .. } => "scores",
            GameEvent::RoundEnd { .. } => "roundEnd",
            GameEvent::GameOver { .. } => "gameOver",
            GameEvent::PlayerJoined(_) => "playerJoined",
            GameEvent::PlayerLeft { .. } => "playerLeft",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(
            serde_json::to_string(&Phase::RoundEnd).unwrap(),
            "\"round-end\""
        );
        assert_eq!(
            serde_json::to_string(&Phase::GameOver).unwrap(),
            "\"game-over\""
        );
        for phase in Phase::ALL {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{}\"", phase.as_str()));
        }
    }

    #[test]
    fn test_action_input_is_tagged() {
        let input: ActionInput =
            serde_json::from_str(r#"{"type":"submitVote","answerId":"a1"}"#).unwrap();
        assert_eq!(
            input,
            ActionInput::SubmitVote {
                answer_id: "a1".to_string()
            }
        );
        assert_eq!(input.action_type(), ActionType::SubmitVote);
    }

    #[test]
    fn test_event_shape_has_type_and_payload() {
        let event = GameEvent::Submitted {
            player_id: "p1".to_string(),
            kind: ActionType::SubmitAnswer,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "submitted");
        assert_eq!(value["payload"]["playerId"], "p1");
        assert_eq!(event.kind(), "submitted");
    }
}
