//! Error taxonomy for the room subsystem.
//!
//! Every failure, whether it comes from the engine, the room coordinator or
//! the transport, is normalised into a [`StandardError`] through
//! [`StandardError::from_error`]. The error's [`ErrorCategory`] decides
//! retryability, whether the user must change something, and the log level,
//! all looked up from [`POLICY_TABLE`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::{ActionType, Phase, PlayerId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Validation,
    BusinessLogic,
    System,
    Authentication,
    Network,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Derived handling policy for a category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryPolicy {
    pub category: ErrorCategory,
    pub retryable: bool,
    pub user_action_required: bool,
    pub log_level: LogLevel,
}

pub const POLICY_TABLE: [CategoryPolicy; 5] = [
    CategoryPolicy {
        category: ErrorCategory::Validation,
        retryable: false,
        user_action_required: true,
        log_level: LogLevel::Debug,
    },
    CategoryPolicy {
        category: ErrorCategory::BusinessLogic,
        retryable: false,
        user_action_required: true,
        log_level: LogLevel::Info,
    },
    CategoryPolicy {
        category: ErrorCategory::System,
        retryable: true,
        user_action_required: false,
        log_level: LogLevel::Error,
    },
    CategoryPolicy {
        category: ErrorCategory::Authentication,
        retryable: false,
        user_action_required: true,
        log_level: LogLevel::Warn,
    },
    CategoryPolicy {
        category: ErrorCategory::Network,
        retryable: true,
        user_action_required: false,
        log_level: LogLevel::Error,
    },
];

impl ErrorCategory {
    pub fn policy(self) -> CategoryPolicy {
        POLICY_TABLE
            .iter()
            .copied()
            .find(|p| p.category == self)
            // Every category has a row; System is the conservative fallback
            .unwrap_or(POLICY_TABLE[2])
    }

    pub fn is_retryable(self) -> bool {
        self.policy().retryable
    }

    pub fn requires_user_action(self) -> bool {
        self.policy().user_action_required
    }

    pub fn log_level(self) -> LogLevel {
        self.policy().log_level
    }
}

/// Expected failures of engine operations. Returned as values, never panics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error("{action:?} is not allowed for player {player_id} during {phase}")]
    NotAllowed {
        action: ActionType,
        phase: Phase,
        player_id: PlayerId,
    },
    #[error("no active round")]
    NoActiveRound,
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("need at least one player to start")]
    NotEnoughPlayers,
    #[error("player {0} already submitted an answer this round")]
    AlreadySubmitted(PlayerId),
    #[error("player {0} already voted this round")]
    AlreadyVoted(PlayerId),
    #[error("that answer has already been given this round")]
    DuplicateAnswer,
    #[error("answer {0} does not exist in this round")]
    UnknownAnswer(String),
    #[error("players cannot vote for their own answer")]
    SelfVote,
    #[error("answer must not be empty")]
    EmptyAnswer,
    #[error("answer is {len} characters, limit is {max}")]
    AnswerTooLong { len: usize, max: usize },
    #[error("player {0} is already in the room")]
    DuplicatePlayer(PlayerId),
    #[error("room is full ({max} players)")]
    RoomFull { max: usize },
    #[error("players can only join during the lobby")]
    JoinClosed,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl ActionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ActionError::NoActiveRound
            | ActionError::UnknownPlayer(_)
            | ActionError::UnknownAnswer(_)
            | ActionError::EmptyAnswer
            | ActionError::AnswerTooLong { .. }
            | ActionError::Invalid(_) => ErrorCategory::Validation,
            ActionError::NotAllowed { .. }
            | ActionError::NotEnoughPlayers
            | ActionError::AlreadySubmitted(_)
            | ActionError::AlreadyVoted(_)
            | ActionError::DuplicateAnswer
            | ActionError::SelfVote
            | ActionError::DuplicatePlayer(_)
            | ActionError::RoomFull { .. }
            | ActionError::JoinClosed => ErrorCategory::BusinessLogic,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ActionError::NotAllowed { .. } => "ACTION_NOT_ALLOWED",
            ActionError::NoActiveRound => "NO_ACTIVE_ROUND",
            ActionError::UnknownPlayer(_) => "UNKNOWN_PLAYER",
            ActionError::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            ActionError::AlreadySubmitted(_) => "ALREADY_SUBMITTED",
            ActionError::AlreadyVoted(_) => "ALREADY_VOTED",
            ActionError::DuplicateAnswer => "DUPLICATE_ANSWER",
            ActionError::UnknownAnswer(_) => "UNKNOWN_ANSWER",
            ActionError::SelfVote => "SELF_VOTE",
            ActionError::EmptyAnswer => "EMPTY_ANSWER",
            ActionError::AnswerTooLong { .. } => "ANSWER_TOO_LONG",
            ActionError::DuplicatePlayer(_) => "DUPLICATE_PLAYER",
            ActionError::RoomFull { .. } => "ROOM_FULL",
            ActionError::JoinClosed => "JOIN_CLOSED",
            ActionError::Invalid(e) => e.code(),
        }
    }
}

/// Input shape/format failures from the boundary validators
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("room code must be 4-8 letters or digits")]
    RoomCode,
    #[error("nickname must be between {min} and {max} characters")]
    Nickname { min: usize, max: usize },
    #[error("{0} must not be empty")]
    Empty(String),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::RoomCode => "INVALID_ROOM_CODE",
            ValidationError::Nickname { .. } => "INVALID_NICKNAME",
            ValidationError::Empty(_) => "EMPTY_FIELD",
        }
    }
}

/// Invariant violations in the phase table. Unreachable with the built-in config.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("phase {0} is not declared in the game config")]
    UnknownPhase(Phase),
}

/// Failures of the room coordinator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(String),
    #[error("room {0} already exists")]
    AlreadyExists(String),
    #[error("room {0} has shut down")]
    Closed(String),
    #[error("room task failed: {0}")]
    TaskFailed(String),
}

/// Union of every failure the room subsystem can surface
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error("malformed message: {0}")]
    Protocol(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::Action(ActionError::Invalid(e))
    }
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Action(e) => e.category(),
            AppError::Config(_) | AppError::Internal(_) => ErrorCategory::System,
            AppError::Room(RoomError::NotFound(_)) => ErrorCategory::Validation,
            AppError::Room(RoomError::AlreadyExists(_)) => ErrorCategory::BusinessLogic,
            AppError::Room(RoomError::Closed(_)) | AppError::Connection(_) => {
                ErrorCategory::Network
            }
            AppError::Room(RoomError::TaskFailed(_)) => ErrorCategory::System,
            AppError::Protocol(_) => ErrorCategory::Validation,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Action(e) => e.code(),
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Room(RoomError::NotFound(_)) => "ROOM_NOT_FOUND",
            AppError::Room(RoomError::AlreadyExists(_)) => "ROOM_EXISTS",
            AppError::Room(RoomError::Closed(_)) => "ROOM_CLOSED",
            AppError::Room(RoomError::TaskFailed(_)) => "ROOM_TASK_FAILED",
            AppError::Protocol(_) => "PARSE_ERROR",
            AppError::Connection(_) => "CONNECTION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Room(RoomError::NotFound(_)) => 404,
            AppError::Room(RoomError::AlreadyExists(_)) => 409,
            AppError::Room(RoomError::Closed(_)) => 503,
            AppError::Connection(_) => 503,
            AppError::Action(ActionError::RoomFull { .. }) => 409,
            _ => match self.category() {
                ErrorCategory::Validation => 400,
                ErrorCategory::BusinessLogic => 422,
                ErrorCategory::Authentication => 401,
                ErrorCategory::Network => 503,
                ErrorCategory::System => 500,
            },
        }
    }
}

/// Normalised error record handed to the transport layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StandardError {
    pub code: String,
    pub message: String,
    pub category: ErrorCategory,
    pub status_code: u16,
    pub details: Option<Value>,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub context: BTreeMap<String, String>,
}

impl StandardError {
    /// The single conversion point from any room-subsystem error.
    pub fn from_error(err: &AppError, context: BTreeMap<String, String>) -> Self {
        let details = match err {
            AppError::Action(ActionError::AnswerTooLong { len, max }) => {
                Some(serde_json::json!({ "len": len, "max": max }))
            }
            AppError::Action(ActionError::NotAllowed { action, phase, .. }) => {
                Some(serde_json::json!({ "action": action, "phase": phase }))
            }
            _ => None,
        };

        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            category: err.category(),
            status_code: err.status_code(),
            details,
            timestamp: Utc::now(),
            request_id: ulid::Ulid::new().to_string(),
            context,
        }
    }

    /// Unexpected failure (e.g. a panicked room task)
    pub fn system(message: impl Into<String>) -> Self {
        Self::from_error(&AppError::Internal(message.into()), BTreeMap::new())
    }

    pub fn with_context(mut self, key: &str, value: impl Into<String>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn retryable(&self) -> bool {
        self.category.is_retryable()
    }

    pub fn user_action_required(&self) -> bool {
        self.category.requires_user_action()
    }

    /// Emit at the level the category policy prescribes
    pub fn log(&self) {
        match self.category.log_level() {
            LogLevel::Debug => tracing::debug!(
                code = %self.code,
                request_id = %self.request_id,
                "{}",
                self.message
            ),
            LogLevel::Info => tracing::info!(
                code = %self.code,
                request_id = %self.request_id,
                "{}",
                self.message
            ),
            LogLevel::Warn => tracing::warn!(
                code = %self.code,
                request_id = %self.request_id,
                "{}",
                self.message
            ),
            LogLevel::Error => tracing::error!(
                code = %self.code,
                request_id = %self.request_id,
                "{}",
                self.message
            ),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::from(self)
    }
}

impl From<AppError> for StandardError {
    fn from(err: AppError) -> Self {
        Self::from_error(&err, BTreeMap::new())
    }
}

impl From<ActionError> for StandardError {
    fn from(err: ActionError) -> Self {
        Self::from_error(&AppError::Action(err), BTreeMap::new())
    }
}

/// Per-client error payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: String,
    pub code: String,
    pub status_code: u16,
    pub details: Option<Value>,
    pub context: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub category: ErrorCategory,
    pub retryable: bool,
    pub user_action_required: bool,
}

impl From<&StandardError> for ErrorEnvelope {
    fn from(e: &StandardError) -> Self {
        Self {
            error: e.message.clone(),
            code: e.code.clone(),
            status_code: e.status_code,
            details: e.details.clone(),
            context: e.context.clone(),
            timestamp: e.timestamp,
            request_id: e.request_id.clone(),
            category: e.category,
            retryable: e.retryable(),
            user_action_required: e.user_action_required(),
        }
    }
}
