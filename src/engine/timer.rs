use chrono::Utc;

use super::GameEngine;
use crate::types::GameState;

impl GameEngine {
    /// Count the phase timer down, flooring at zero. Never changes phase;
    /// the room decides what to do once the countdown is spent.
    pub fn update_timer(&self, state: &GameState, elapsed_ms: u64) -> GameState {
        let mut next = state.clone();
        next.time_left_ms = next.time_left_ms.saturating_sub(elapsed_ms);
        if let Some(round) = next.current_round.as_mut() {
            round.time_left_ms = round.time_left_ms.saturating_sub(elapsed_ms);
        }
        next.updated_at = Utc::now();
        next
    }

    /// Countdown spent in a phase that advances on its own
    pub fn is_phase_expired(&self, state: &GameState) -> bool {
        state.time_left_ms == 0
            && self
                .current_phase(state)
                .is_ok_and(|phase| phase.auto_advance)
    }
}
