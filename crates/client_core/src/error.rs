use shared::{domain::TodoId, error::ApiError, validation::ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid todo: {0}")]
    Validation(#[from] ValidationError),
    #[error("todo not found: {0}")]
    NotFound(String),
    #[error("remote store unreachable: {0}")]
    Transport(String),
    #[error("remote store rejected request: {0}")]
    Rejected(ApiError),
    #[error(transparent)]
    Drag(#[from] DragError),
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        ClientError::Transport(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DragError {
    #[error("todo {active} is already being dragged")]
    AlreadyDragging { active: TodoId },
    #[error("todo {0} is not in the displayed list")]
    UnknownItem(TodoId),
    #[error("no drag in progress")]
    NotDragging,
}
