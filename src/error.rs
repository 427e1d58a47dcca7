use crate::store::StoreError;

/// Room operation result type
pub type Result<T> = std::result::Result<T, RoomError>;

/// Room operation errors
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid vote: {0}")]
    InvalidVote(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Not every player has voted yet")]
    NotReady,

    #[error("Room not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(#[from] StoreError),
}

impl RoomError {
    /// Stable tag sent to clients alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvalidVote(_) => "invalid_vote",
            Self::Permission(_) => "permission",
            Self::NotReady => "not_ready",
            Self::NotFound(_) => "not_found",
            Self::Transport(_) => "transport",
        }
    }
}
