use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a remote job correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStatus {
    /// Creation request accepted by the remote system
    Dispatched,
    /// Scanning recent jobs for the correlation token
    Discovering,
    /// Handle known; waiting for completion
    Found,
    /// Terminal outcome recorded and emitted
    Completed,
}

impl CorrelationStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether a handle is guaranteed to be present
    pub fn has_handle(&self) -> bool {
        matches!(self, Self::Found | Self::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::Discovering => "discovering",
            Self::Found => "found",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for CorrelationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CorrelationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dispatched" => Ok(Self::Dispatched),
            "discovering" => Ok(Self::Discovering),
            "found" => Ok(Self::Found),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid correlation status: {s}")),
        }
    }
}

impl Default for CorrelationStatus {
    fn default() -> Self {
        Self::Dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_check() {
        assert!(CorrelationStatus::Completed.is_terminal());
        assert!(!CorrelationStatus::Found.is_terminal());
        assert!(!CorrelationStatus::Dispatched.is_terminal());
    }

    #[test]
    fn test_ordering_follows_lifecycle() {
        assert!(CorrelationStatus::Dispatched < CorrelationStatus::Discovering);
        assert!(CorrelationStatus::Discovering < CorrelationStatus::Found);
        assert!(CorrelationStatus::Found < CorrelationStatus::Completed);
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(CorrelationStatus::Discovering.to_string(), "discovering");
        assert_eq!(
            "found".parse::<CorrelationStatus>().unwrap(),
            CorrelationStatus::Found
        );
        assert!("running".parse::<CorrelationStatus>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&CorrelationStatus::Found).unwrap();
        assert_eq!(json, "\"found\"");
    }
}
