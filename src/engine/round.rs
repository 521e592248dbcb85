use std::collections::BTreeMap;

use super::GameEngine;
use crate::types::*;

impl GameEngine {
    /// Begin the next round, or end the game once `max_rounds` is exceeded.
    /// This is the only place rounds are seeded.
    pub fn start_new_round(&self, state: &GameState) -> GameState {
        let mut next = state.clone();
        next.round += 1;

        if next.round > next.max_rounds {
            tracing::debug!(round = next.round, "Round limit reached, game over");
            return self.enter_phase(next, Phase::GameOver);
        }

        let next = self.seed_round(next);
        self.enter_phase(next, Phase::Prompt)
    }

    /// Install a fresh round for `state.round`
    pub(super) fn seed_round(&self, mut state: GameState) -> GameState {
        let card = self.prompt_for_round(state.round);
        let truth_teller = if state.players.is_empty() {
            None
        } else {
            let idx = (state.round.saturating_sub(1) as usize) % state.players.len();
            Some(state.players[idx].id.clone())
        };

        state.current_round = Some(Round {
            round_number: state.round,
            prompt_id: card.id,
            prompt: card.text,
            answers: BTreeMap::new(),
            votes: BTreeMap::new(),
            time_left_ms: state.time_left_ms,
            phase: state.phase,
            correct_answer_id: None,
            truth_teller,
            scored_at: None,
        });
        state.is_round_complete = false;
        state
    }

    /// Every seated player has voted
    pub fn is_round_complete(&self, state: &GameState) -> bool {
        state
            .current_round
            .as_ref()
            .is_some_and(|round| round.votes.len() == state.players.len())
    }

    /// Every seated player has submitted an answer
    pub fn all_answers_in(&self, state: &GameState) -> bool {
        match &state.current_round {
            Some(round) => state
                .players
                .iter()
                .all(|p| round.answer_of(&p.id).is_some()),
            None => false,
        }
    }
}
