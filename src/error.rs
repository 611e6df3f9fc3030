//! Engine error taxonomy
//!
//! Every failed command maps to exactly one variant, and every variant has a
//! stable wire code that clients can switch on.

use crate::types::SessionStatus;

pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("At least {required} players are required, only {actual} joined")]
    NotEnoughPlayers { required: usize, actual: usize },

    #[error("No question is on the board")]
    NoActiveQuestion,

    #[error("\"{0}\" is already on the board")]
    AlreadyRevealed(String),

    #[error("No questions available")]
    NoQuestionsAvailable,

    #[error("Unknown team: {0}")]
    InvalidTeam(String),

    #[error("Fast Money is not running")]
    NotInFastMoneyMode,

    #[error("Cannot {action} while the game is {status}")]
    InvalidPhase {
        action: &'static str,
        status: SessionStatus,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Not allowed to {0}")]
    Unauthorized(&'static str),

    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    #[error("Player {player} already answered question {index}")]
    FastMoneyAnswerExists { player: u8, index: usize },

    #[error("Could not allocate a unique game code after {0} attempts")]
    CodeSpaceExhausted(usize),
}

impl GameError {
    /// Wire code sent to clients alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            GameError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            GameError::NotEnoughPlayers { .. } => "NOT_ENOUGH_PLAYERS",
            GameError::NoActiveQuestion => "NO_ACTIVE_QUESTION",
            GameError::AlreadyRevealed(_) => "ALREADY_REVEALED",
            GameError::NoQuestionsAvailable => "NO_QUESTIONS_AVAILABLE",
            GameError::InvalidTeam(_) => "INVALID_TEAM",
            GameError::NotInFastMoneyMode => "NOT_IN_FAST_MONEY_MODE",
            GameError::InvalidPhase { .. } => "INVALID_PHASE",
            GameError::InvalidInput(_) => "INVALID_INPUT",
            GameError::InvalidSettings(_) => "INVALID_SETTINGS",
            GameError::Unauthorized(_) => "UNAUTHORIZED",
            GameError::PlayerNotFound(_) => "PLAYER_NOT_FOUND",
            GameError::FastMoneyAnswerExists { .. } => "FAST_MONEY_ANSWER_EXISTS",
            GameError::CodeSpaceExhausted(_) => "CODE_SPACE_EXHAUSTED",
        }
    }

    /// Lookup failures (404 on the HTTP surface)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GameError::SessionNotFound(_) | GameError::PlayerNotFound(_)
        )
    }
}
