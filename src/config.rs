//! Phase configuration table and environment-driven server settings

use serde::{Deserialize, Serialize};

use crate::types::{ActionType, Phase};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhaseConfig {
    pub name: Phase,
    pub duration_ms: u64,
    pub allowed_actions: Vec<ActionType>,
    pub auto_advance: bool,
    pub requires_all_players: bool,
    pub can_skip: bool,
}

impl PhaseConfig {
    /// Phases with a running countdown
    pub fn is_timed(&self) -> bool {
        self.duration_ms > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DefaultSettings {
    pub max_rounds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub id: String,
    pub name: String,
    pub min_players: usize,
    pub max_players: usize,
    pub phases: Vec<PhaseConfig>,
    pub default_settings: DefaultSettings,
}

impl GameConfig {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseConfig> {
        self.phases.iter().find(|p| p.name == phase)
    }
}

fn phase(
    name: Phase,
    duration_ms: u64,
    allowed_actions: &[ActionType],
    auto_advance: bool,
    requires_all_players: bool,
    can_skip: bool,
) -> PhaseConfig {
    PhaseConfig {
        name,
        duration_ms,
        allowed_actions: allowed_actions.to_vec(),
        auto_advance,
        requires_all_players,
        can_skip,
    }
}

/// The built-in game definition: seven phases in lifecycle order.
pub fn game_config() -> GameConfig {
    GameConfig {
        id: "party-round".to_string(),
        name: "Party Round".to_string(),
        min_players: 2,
        max_players: 8,
        phases: vec![
            phase(Phase::Lobby, 0, &[ActionType::Start], false, false, false),
            phase(Phase::Prompt, 60_000, &[ActionType::SubmitAnswer], true, true, false),
            phase(Phase::Choose, 30_000, &[ActionType::SubmitVote], true, true, false),
            phase(Phase::Reveal, 10_000, &[], true, false, true),
            phase(Phase::Scoring, 8_000, &[], true, false, true),
            phase(Phase::RoundEnd, 0, &[], false, false, false),
            phase(Phase::GameOver, 0, &[], false, false, false),
        ],
        default_settings: DefaultSettings { max_rounds: 5 },
    }
}

/// Process-wide settings read from the environment (and `.env`)
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    /// Timer cadence for running rooms
    pub tick_ms: u64,
    pub max_rounds: u32,
    pub max_answer_chars: usize,
    /// How long a room with nobody connected stays open
    pub idle_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 6573,
            tick_ms: 1000,
            max_rounds: game_config().default_settings.max_rounds,
            max_answer_chars: 500,
            idle_timeout_ms: 300_000,
        }
    }
}

impl ServerConfig {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_or("PARTY_PORT", defaults.port),
            tick_ms: env_or("PARTY_TICK_MS", defaults.tick_ms).max(10),
            max_rounds: env_or("PARTY_MAX_ROUNDS", defaults.max_rounds).max(1),
            max_answer_chars: env_or("PARTY_MAX_ANSWER_CHARS", defaults.max_answer_chars),
            idle_timeout_ms: env_or("PARTY_IDLE_TIMEOUT_MS", defaults.idle_timeout_ms),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring invalid {}={:?}, using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}
