use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

pub type EditorResult<T> = std::result::Result<T, EditorError>;

/// Per-operation failure. None of these are fatal; every one is recoverable by
/// retrying or reloading the list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("you must be signed in to {0}")]
    AuthRequired(String),
    #[error("list is completed; reopen it before making changes")]
    Locked,
    #[error("tier '{tier}' still holds {item_count} item(s); move all items out first")]
    TierNotEmpty { tier: String, item_count: usize },
    #[error("at least one tier must exist")]
    LastTier,
    #[error("{0} not found")]
    NotFound(String),
    #[error("record store failure: {0}")]
    Store(String),
}

impl EditorError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn store(err: &anyhow::Error) -> Self {
        Self::Store(format!("{err:#}"))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::Validation,
            Self::AuthRequired(_) => ErrorCode::Unauthorized,
            Self::Locked => ErrorCode::Locked,
            Self::TierNotEmpty { .. } | Self::LastTier => ErrorCode::Conflict,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Store(_) => ErrorCode::Store,
        }
    }
}

impl From<EditorError> for ApiError {
    fn from(value: EditorError) -> Self {
        ApiError::new(value.code(), value.to_string())
    }
}
