use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;

use super::{GameEngine, Transition};
use crate::error::ActionError;
use crate::types::*;

const ANSWER_ID_LEN: usize = 12;

/// Random answer id. Must not follow submission order: the choose view lists
/// answers by id while authors are still hidden.
fn new_answer_id() -> AnswerId {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(ANSWER_ID_LEN)
        .map(char::from)
        .collect()
}

/// Normalize text for duplicate comparison (trim whitespace, lowercase)
fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

impl GameEngine {
    /// Actions this player may issue right now
    pub fn valid_actions(&self, state: &GameState, player_id: &str) -> Vec<ActionType> {
        if state.player(player_id).is_none() {
            return Vec::new();
        }
        let Some(phase) = self.config.phase(state.phase) else {
            return Vec::new();
        };
        let is_host = state.host_id().is_some_and(|id| id == player_id);

        phase
            .allowed_actions
            .iter()
            .copied()
            .filter(|action| match action {
                ActionType::Start => is_host,
                ActionType::SubmitAnswer | ActionType::SubmitVote => true,
            })
            .collect()
    }

    /// Validate and apply a player action.
    ///
    /// On failure the input state is untouched and nothing must be broadcast.
    pub fn process_action(
        &self,
        state: &GameState,
        action: &Action,
    ) -> Result<Transition, ActionError> {
        let action_type = action.action_type();

        // Round gating holds in every phase, before the phase check
        if matches!(action_type, ActionType::SubmitAnswer | ActionType::SubmitVote)
            && state.current_round.is_none()
        {
            return Err(ActionError::NoActiveRound);
        }

        if state.player(&action.player_id).is_none() {
            return Err(ActionError::UnknownPlayer(action.player_id.clone()));
        }

        if !self
            .valid_actions(state, &action.player_id)
            .contains(&action_type)
        {
            return Err(ActionError::NotAllowed {
                action: action_type,
                phase: state.phase,
                player_id: action.player_id.clone(),
            });
        }

        match &action.input {
            ActionInput::Start => self.apply_start(state),
            ActionInput::SubmitAnswer { text } => {
                self.apply_answer(state, &action.player_id, text)
            }
            ActionInput::SubmitVote { answer_id } => {
                self.apply_vote(state, &action.player_id, answer_id)
            }
        }
    }

    fn apply_start(&self, state: &GameState) -> Result<Transition, ActionError> {
        if state.players.is_empty() {
            return Err(ActionError::NotEnoughPlayers);
        }

        // lobby -> prompt, then round 1 picks up the prompt countdown
        let mut next = self.advance_phase(state);
        next.round += 1;
        let next = self.seed_round(next);

        tracing::info!(players = next.players.len(), "Game started");

        let events = vec![self.prompt_event(&next), GameEvent::RoomUpdate(self.snapshot(&next))];
        Ok(Transition {
            state: next,
            events,
        })
    }

    fn apply_answer(
        &self,
        state: &GameState,
        player_id: &str,
        text: &str,
    ) -> Result<Transition, ActionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ActionError::EmptyAnswer);
        }
        let len = text.chars().count();
        if len > self.settings.max_answer_chars {
            return Err(ActionError::AnswerTooLong {
                len,
                max: self.settings.max_answer_chars,
            });
        }

        let mut next = state.clone();
        let round = next
            .current_round
            .as_mut()
            .ok_or(ActionError::NoActiveRound)?;

        if round.answer_of(player_id).is_some() {
            return Err(ActionError::AlreadySubmitted(player_id.to_string()));
        }
        let normalized = normalize(text);
        if round.answers.values().any(|a| normalize(&a.text) == normalized) {
            return Err(ActionError::DuplicateAnswer);
        }

        let answer_id = new_answer_id();
        round.answers.insert(
            answer_id.clone(),
            Answer {
                player_id: player_id.to_string(),
                text: text.to_string(),
            },
        );
        if round.truth_teller.as_deref() == Some(player_id) {
            round.correct_answer_id = Some(answer_id);
        }
        next.updated_at = Utc::now();

        tracing::debug!(player_id, "Answer submitted");

        Ok(Transition {
            state: next,
            events: vec![GameEvent::Submitted {
                player_id: player_id.to_string(),
                kind: ActionType::SubmitAnswer,
            }],
        })
    }

    fn apply_vote(
        &self,
        state: &GameState,
        player_id: &str,
        answer_id: &str,
    ) -> Result<Transition, ActionError> {
        let mut next = state.clone();
        let round = next
            .current_round
            .as_mut()
            .ok_or(ActionError::NoActiveRound)?;

        let answer = round
            .answers
            .get(answer_id)
            .ok_or_else(|| ActionError::UnknownAnswer(answer_id.to_string()))?;
        if answer.player_id == player_id {
            return Err(ActionError::SelfVote);
        }
        if round.votes.contains_key(player_id) {
            return Err(ActionError::AlreadyVoted(player_id.to_string()));
        }

        round
            .votes
            .insert(player_id.to_string(), answer_id.to_string());
        next.is_round_complete = self.is_round_complete(&next);
        next.updated_at = Utc::now();

        tracing::debug!(player_id, answer_id, "Vote recorded");

        Ok(Transition {
            state: next,
            events: vec![GameEvent::Submitted {
                player_id: player_id.to_string(),
                kind: ActionType::SubmitVote,
            }],
        })
    }

    /// `prompt` event for the state's current round
    pub fn prompt_event(&self, state: &GameState) -> GameEvent {
        let round = state.current_round.as_ref();
        GameEvent::Prompt {
            round: state.round,
            prompt_id: round.map(|r| r.prompt_id.clone()).unwrap_or_default(),
            prompt: round.map(|r| r.prompt.clone()).unwrap_or_default(),
            truth_teller: round.and_then(|r| r.truth_teller.clone()),
            time_left_ms: state.time_left_ms,
        }
    }
}
