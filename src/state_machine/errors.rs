use thiserror::Error;

/// Errors raised while moving a correlation between states
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("External job handle already set to {existing}")]
    HandleAlreadySet { existing: String },

    #[error("Invalid state in storage: {0}")]
    InvalidStoredState(String),
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
