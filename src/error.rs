//! Error types for the remote job connector.

use crate::config::ConfigurationError;
use crate::state_machine::StateMachineError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectorError {
    #[error("Dispatch failed for token {token}: {reason}")]
    DispatchFailed { token: String, reason: String },
    #[error("Remote job handle not found for token {token} after {attempts} attempts")]
    HandleNotFound { token: String, attempts: u32 },
    #[error("Remote client error during {operation}: {reason}")]
    RemoteClient { operation: String, reason: String },
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("State transition error: {0}")]
    StateTransition(String),
    #[error("Scheduling error: {0}")]
    Scheduling(String),
    #[error("Emission error: {0}")]
    Emission(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Notification error: {0}")]
    Notification(String),
}

impl ConnectorError {
    /// Wrap an opaque collaborator error raised during `operation`
    pub fn remote(operation: impl Into<String>, error: &anyhow::Error) -> Self {
        Self::RemoteClient {
            operation: operation.into(),
            reason: format!("{error:#}"),
        }
    }

    /// Whether the failure ends the execution (as opposed to a retryable hiccup)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DispatchFailed { .. }
                | Self::HandleNotFound { .. }
                | Self::StateTransition(_)
                | Self::Configuration(_)
        )
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(error: serde_json::Error) -> Self {
        ConnectorError::Notification(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for ConnectorError {
    fn from(err: sqlx::Error) -> Self {
        ConnectorError::Storage(err.to_string())
    }
}

impl From<StateMachineError> for ConnectorError {
    fn from(err: StateMachineError) -> Self {
        ConnectorError::StateTransition(err.to_string())
    }
}

impl From<ConfigurationError> for ConnectorError {
    fn from(err: ConfigurationError) -> Self {
        ConnectorError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_not_found_message() {
        let err = ConnectorError::HandleNotFound {
            token: "tasker-abc".to_string(),
            attempts: 15,
        };
        assert_eq!(
            err.to_string(),
            "Remote job handle not found for token tasker-abc after 15 attempts"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_remote_error_keeps_context_chain() {
        let source = anyhow::anyhow!("connection reset").context("GET /runs");
        let err = ConnectorError::remote("list_recent", &source);
        assert_eq!(
            err.to_string(),
            "Remote client error during list_recent: GET /runs: connection reset"
        );
        assert!(!err.is_fatal());
    }
}
