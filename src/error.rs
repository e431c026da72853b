use crate::types::{ParticipantId, SessionCode};

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;

/// Errors a game operation can be rejected with.
///
/// Every variant is a synchronous validation failure: a rejected action leaves
/// the session exactly as it was, and retrying the same action will fail the
/// same way.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("Session {0} not found")]
    SessionNotFound(SessionCode),

    #[error("Participant {0} not found")]
    ParticipantNotFound(ParticipantId),

    #[error("Invalid phase: {0}")]
    InvalidPhase(String),

    #[error("Invalid actor: {0}")]
    InvalidActor(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("{0} has already acted this phase")]
    AlreadyActed(ParticipantId),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Username {0} is already taken")]
    UsernameTaken(String),

    #[error("Session is full ({0} players)")]
    SessionFull(usize),

    #[error("Not enough players: {joined} joined, {required} required")]
    NotEnoughPlayers { joined: usize, required: usize },

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Session {0} is no longer running")]
    SessionClosed(SessionCode),
}

impl GameError {
    /// Stable code sent to clients alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            GameError::SessionNotFound(_) | GameError::ParticipantNotFound(_) => "NOT_FOUND",
            GameError::InvalidPhase(_) => "INVALID_PHASE",
            GameError::InvalidActor(_) => "INVALID_ACTOR",
            GameError::InvalidTarget(_) => "INVALID_TARGET",
            GameError::AlreadyActed(_) => "ALREADY_ACTED",
            GameError::InvalidUsername(_) => "INVALID_USERNAME",
            GameError::UsernameTaken(_) => "USERNAME_TAKEN",
            GameError::SessionFull(_) => "SESSION_FULL",
            GameError::NotEnoughPlayers { .. } => "NOT_ENOUGH_PLAYERS",
            GameError::Storage(_) => "STORAGE_ERROR",
            GameError::SessionClosed(_) => "SESSION_CLOSED",
        }
    }
}

/// Errors from the persistence layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Incompatible snapshot: {0}")]
    Incompatible(String),

    #[error("Not a session code: {0:?}")]
    InvalidCode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for GameError {
    fn from(e: StoreError) -> Self {
        GameError::Storage(e.to_string())
    }
}
