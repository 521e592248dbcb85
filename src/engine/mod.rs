//! The round state machine.
//!
//! Every operation takes the current [`GameState`] by reference and returns a
//! new value; nothing is mutated in place, so a room can replay or test any
//! sequence of actions and ticks deterministically. Expected failures come
//! back as [`ActionError`](crate::error::ActionError) values.

mod action;
mod game;
mod round;
mod score;
mod timer;
mod view;

pub use view::{AnswerView, PlayerView, RoomSnapshot, RoundView};

use crate::config::{game_config, GameConfig, ServerConfig};
use crate::types::{GameEvent, GameState, PromptCard};

pub const TRUE_ANSWER_BONUS: i64 = 1000;
pub const POINTS_PER_VOTE: i64 = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub max_rounds: u32,
    pub max_answer_chars: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_rounds: game_config().default_settings.max_rounds,
            max_answer_chars: 500,
        }
    }
}

impl From<&ServerConfig> for EngineSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_rounds: config.max_rounds,
            max_answer_chars: config.max_answer_chars,
        }
    }
}

/// Result of a successful action: the replacement state plus what to broadcast
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: GameState,
    pub events: Vec<GameEvent>,
}

const DEFAULT_PROMPTS: &[(&str, &str)] = &[
    ("p-octopus", "An octopus has this many hearts."),
    ("p-honey", "Archaeologists found edible ___ in Egyptian tombs."),
    ("p-flamingo", "A group of flamingos is called a ___."),
    ("p-venus", "A day on Venus is longer than its ___."),
    ("p-scotland", "The national animal of Scotland is the ___."),
    ("p-banana", "Botanically speaking, bananas are ___."),
    ("p-wombat", "Wombat droppings are shaped like ___."),
    ("p-eiffel", "In summer the Eiffel Tower grows by about ___."),
];

#[derive(Debug, Clone)]
pub struct GameEngine {
    config: GameConfig,
    settings: EngineSettings,
    prompts: Vec<PromptCard>,
}

impl GameEngine {
    pub fn new(settings: EngineSettings) -> Self {
        let prompts = DEFAULT_PROMPTS
            .iter()
            .map(|(id, text)| PromptCard::new(*id, *text))
            .collect();
        Self {
            config: game_config(),
            settings,
            prompts,
        }
    }

    /// Use a custom prompt deck. Rounds draw from it in order, wrapping around;
    /// an empty deck keeps the built-in one.
    pub fn with_prompts(mut self, prompts: Vec<PromptCard>) -> Self {
        if !prompts.is_empty() {
            self.prompts = prompts;
        }
        self
    }

    pub fn prompts(&self) -> &[PromptCard] {
        &self.prompts
    }

    fn prompt_for_round(&self, round: u32) -> PromptCard {
        let idx = (round.saturating_sub(1) as usize) % self.prompts.len();
        self.prompts[idx].clone()
    }
}

impl Default for GameEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}
