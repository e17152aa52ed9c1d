use thiserror::Error;

use crate::evaluator::EvaluatorError;
use crate::capture::ImageError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("Invalid session id: {0}")]
    InvalidSession(String),

    #[error("Invalid theme: {0}")]
    InvalidTheme(String),

    #[error("Shutting down; new sessions are not accepted")]
    ShuttingDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JudgeError {
    /// Whether the error was caused by caller-supplied input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidSession(_) | Self::InvalidTheme(_))
    }
}

pub type Result<T> = std::result::Result<T, JudgeError>;
