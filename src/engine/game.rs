use std::collections::BTreeMap;

use chrono::Utc;

use super::GameEngine;
use crate::config::PhaseConfig;
use crate::error::{ActionError, ConfigError};
use crate::types::*;

impl GameEngine {
    /// Create a fresh lobby. Carried-over scores are reset to zero.
    pub fn initialize(&self, players: Vec<Player>) -> GameState {
        let now = Utc::now();
        let players = players
            .into_iter()
            .map(|p| Player { score: 0, ..p })
            .collect();

        GameState {
            phase: Phase::Lobby,
            players,
            round: 0,
            max_rounds: self.settings.max_rounds,
            time_left_ms: 0,
            scores: BTreeMap::new(),
            current_round: None,
            is_round_complete: false,
            created_at: now,
            updated_at: now,
            phase_start_time: now,
        }
    }

    /// Config for the state's current phase
    pub fn current_phase(&self, state: &GameState) -> Result<&PhaseConfig, ConfigError> {
        self.config
            .phase(state.phase)
            .ok_or(ConfigError::UnknownPhase(state.phase))
    }

    pub fn is_game_over(&self, state: &GameState) -> bool {
        state.phase == Phase::GameOver
    }

    /// Successor in the fixed phase order; game-over is terminal
    pub fn next_phase(phase: Phase) -> Phase {
        use Phase::*;

        match phase {
            Lobby => Prompt,
            Prompt => Choose,
            Choose => Reveal,
            Reveal => Scoring,
            Scoring => RoundEnd,
            RoundEnd => GameOver,
            GameOver => GameOver,
        }
    }

    /// Move to the next phase and restart its countdown.
    /// Round number and round content are left alone.
    pub fn advance_phase(&self, state: &GameState) -> GameState {
        let next = Self::next_phase(state.phase);
        self.enter_phase(state.clone(), next)
    }

    pub(super) fn enter_phase(&self, mut state: GameState, phase: Phase) -> GameState {
        let now = Utc::now();
        let duration = self
            .config
            .phase(phase)
            .map(|p| p.duration_ms)
            .unwrap_or(0);

        state.phase = phase;
        state.time_left_ms = duration;
        state.phase_start_time = now;
        state.updated_at = now;
        if let Some(round) = state.current_round.as_mut() {
            round.phase = phase;
            round.time_left_ms = duration;
        }
        state
    }

    /// Seat a new player. Only allowed in the lobby.
    pub fn join_player(&self, state: &GameState, player: Player) -> Result<GameState, ActionError> {
        if state.phase != Phase::Lobby {
            return Err(ActionError::JoinClosed);
        }
        if state.player(&player.id).is_some() {
            return Err(ActionError::DuplicatePlayer(player.id));
        }
        if state.players.len() >= self.config.max_players {
            return Err(ActionError::RoomFull {
                max: self.config.max_players,
            });
        }

        let mut next = state.clone();
        next.players.push(Player {
            score: 0,
            connected: true,
            ..player
        });
        next.updated_at = Utc::now();
        Ok(next)
    }

    /// Free a lobby seat. Once the game runs seats are fixed, so this is a
    /// no-op outside the lobby or for unknown ids.
    pub fn remove_player(&self, state: &GameState, player_id: &str) -> GameState {
        let mut next = state.clone();
        if next.phase != Phase::Lobby {
            return next;
        }
        let before = next.players.len();
        next.players.retain(|p| p.id != player_id);
        if next.players.len() != before {
            next.scores.remove(player_id);
            next.updated_at = Utc::now();
        }
        next
    }

    /// Mark a seated player as (dis)connected. Unknown ids leave the state as is.
    pub fn set_connected(&self, state: &GameState, player_id: &str, connected: bool) -> GameState {
        let mut next = state.clone();
        if let Some(player) = next.players.iter_mut().find(|p| p.id == player_id) {
            player.connected = connected;
            next.updated_at = Utc::now();
        }
        next
    }
}
