use thiserror::Error;

/// Error taxonomy for the messaging core.
///
/// Storage and provider failures are surfaced as `Storage`/`Internal` and
/// must never leak internal detail to clients; push and realtime fan-out
/// failures are absorbed by the callers and never appear here.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    InvalidInput(String),

    #[error("invalid recipient")]
    InvalidRecipient,

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] diesel::result::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ChatError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ChatError::InvalidInput(msg.into())
    }
}
