//! Client-facing projections of the game state.
//!
//! Answer authors and the true answer stay hidden until the reveal phase so a
//! snapshot can be broadcast to everyone without spoiling the vote.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::GameEngine;
use crate::types::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub avatar: Option<String>,
    pub connected: bool,
    pub score: i64,
    /// Has an answer (prompt) or vote (choose) in the current round
    pub has_acted: bool,
}

/// Public answer info (author only after reveal)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    pub id: AnswerId,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_true: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub round_number: u32,
    pub prompt_id: PromptId,
    pub prompt: String,
    pub truth_teller: Option<PlayerId>,
    /// Texts are withheld while answers are still being written
    pub answers: Vec<AnswerView>,
    pub answer_count: usize,
    pub vote_count: usize,
    pub correct_answer_id: Option<AnswerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub phase: Phase,
    pub round: u32,
    pub max_rounds: u32,
    pub time_left_ms: u64,
    pub players: Vec<PlayerView>,
    pub scores: BTreeMap<PlayerId, i64>,
    pub current_round: Option<RoundView>,
    pub is_round_complete: bool,
}

impl GameEngine {
    pub fn snapshot(&self, state: &GameState) -> RoomSnapshot {
        let round = state.current_round.as_ref();
        let players = state
            .players
            .iter()
            .map(|p| PlayerView {
                id: p.id.clone(),
                name: p.name.clone(),
                avatar: p.avatar.clone(),
                connected: p.connected,
                score: p.score,
                has_acted: round.is_some_and(|r| match state.phase {
                    Phase::Prompt => r.answer_of(&p.id).is_some(),
                    Phase::Choose => r.votes.contains_key(&p.id),
                    _ => false,
                }),
            })
            .collect();

        RoomSnapshot {
            phase: state.phase,
            round: state.round,
            max_rounds: state.max_rounds,
            time_left_ms: state.time_left_ms,
            players,
            scores: state.scores.clone(),
            current_round: round.map(|r| round_view(r, state.phase)),
            is_round_complete: state.is_round_complete,
        }
    }
}

/// True from the reveal onwards
pub fn is_revealed(phase: Phase) -> bool {
    matches!(
        phase,
        Phase::Reveal | Phase::Scoring | Phase::RoundEnd | Phase::GameOver
    )
}

fn round_view(round: &Round, phase: Phase) -> RoundView {
    let revealed = is_revealed(phase);
    let counts = round.vote_counts();

    let answers = if phase == Phase::Prompt {
        Vec::new()
    } else {
        round
            .answers
            .iter()
            .map(|(id, answer)| AnswerView {
                id: id.clone(),
                text: answer.text.clone(),
                player_id: revealed.then(|| answer.player_id.clone()),
                is_true: revealed.then(|| round.correct_answer_id.as_ref() == Some(id)),
                votes: revealed.then(|| counts.get(id).copied().unwrap_or(0)),
            })
            .collect()
    };

    RoundView {
        round_number: round.round_number,
        prompt_id: round.prompt_id.clone(),
        prompt: round.prompt.clone(),
        truth_teller: round.truth_teller.clone(),
        answers,
        answer_count: round.answers.len(),
        vote_count: round.votes.len(),
        correct_answer_id: if revealed {
            round.correct_answer_id.clone()
        } else {
            None
        },
    }
}
