use crate::models::{ExternalJobHandle, JobOutcome};
use serde::{Deserialize, Serialize};

/// Events that can trigger correlation state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CorrelationEvent {
    /// Dispatch succeeded; start scanning for the remote job
    BeginDiscovery,
    /// The remote job was located
    HandleDiscovered(ExternalJobHandle),
    /// The remote job reached a terminal status
    Complete(JobOutcome),
}

impl CorrelationEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::BeginDiscovery => "begin_discovery",
            Self::HandleDiscovered(_) => "handle_discovered",
            Self::Complete(_) => "complete",
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}
