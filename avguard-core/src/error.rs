use avguard_model::{EngineFailure, ModelError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("Engine failure: {0}")]
    Engine(#[from] EngineFailure),

    #[error("Decode error: {0}")]
    Decode(#[from] ModelError),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GuardError {
    /// The engine failure carried by this error, if it came from the engine.
    pub fn engine_failure(&self) -> Option<&EngineFailure> {
        match self {
            GuardError::Engine(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn error_code(&self) -> Option<i32> {
        self.engine_failure().map(|failure| failure.error_code)
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;
