use super::identifiers::{CorrelationToken, ExternalJobHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Final verdict of a remote job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Unknown,
    Success,
    Failure,
}

impl JobOutcome {
    /// Map a provider conclusion string. Empty or unrecognised-as-unset values are `Unknown`;
    /// any other non-success conclusion (cancelled, timed_out, ...) counts as failure.
    pub fn from_provider(conclusion: &str) -> Self {
        match conclusion.trim().to_ascii_lowercase().as_str() {
            "" | "unknown" | "none" | "null" => Self::Unknown,
            "success" | "succeeded" | "successful" | "passed" | "ok" => Self::Success,
            _ => Self::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl Default for JobOutcome {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            _ => Err(format!("Invalid job outcome: {s}")),
        }
    }
}

/// Coarse run state of a remote job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteRunState {
    Queued,
    InProgress,
    Completed,
}

impl RemoteRunState {
    /// Map a provider status string; anything unrecognised is treated as still running
    pub fn from_provider(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" | "waiting" | "requested" | "created" | "scheduled" => {
                Self::Queued
            }
            "completed" | "complete" | "finished" | "done" | "success" | "succeeded"
            | "failed" | "failure" | "error" | "errored" | "cancelled" | "canceled"
            | "timed_out" | "skipped" => Self::Completed,
            _ => Self::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// A job as returned by the listing collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteJob {
    pub handle: ExternalJobHandle,
    pub name: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl RemoteJob {
    /// Whether the job's name or any metadata value carries `token`
    pub fn carries_token(&self, token: &CorrelationToken) -> bool {
        token.is_contained_in(&self.name)
            || self
                .metadata
                .values()
                .any(|value| token.is_contained_in(value))
    }
}

/// Status observed for a known handle, from either the status client or a notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteJobStatus {
    pub handle: ExternalJobHandle,
    pub state: RemoteRunState,
    pub outcome: JobOutcome,
    /// Provider status string as received
    pub raw_status: String,
    pub url: Option<String>,
}

impl RemoteJobStatus {
    /// Build from provider strings. Providers that fold the conclusion into the status
    /// (`success`, `failed`) get their outcome derived from it.
    pub fn from_provider(
        handle: ExternalJobHandle,
        status: &str,
        conclusion: &str,
        url: Option<String>,
    ) -> Self {
        let state = RemoteRunState::from_provider(status);
        let mut outcome = JobOutcome::from_provider(conclusion);
        if outcome == JobOutcome::Unknown && state.is_terminal() {
            let folded = status.trim().to_ascii_lowercase();
            if !matches!(folded.as_str(), "completed" | "complete" | "finished" | "done") {
                outcome = JobOutcome::from_provider(&folded);
            }
        }

        Self {
            handle,
            state,
            outcome,
            raw_status: status.to_string(),
            url,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            handle: self.handle.clone(),
            status: self.raw_status.clone(),
            outcome: self.outcome,
            url: self.url.clone(),
            observed_at: Utc::now(),
        }
    }
}

/// Last known remote job metadata; the payload of terminal emissions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub handle: ExternalJobHandle,
    pub status: String,
    pub outcome: JobOutcome,
    pub url: Option<String>,
    pub observed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(JobOutcome::from_provider("success"), JobOutcome::Success);
        assert_eq!(JobOutcome::from_provider("SUCCESS"), JobOutcome::Success);
        assert_eq!(JobOutcome::from_provider("cancelled"), JobOutcome::Failure);
        assert_eq!(JobOutcome::from_provider("timed_out"), JobOutcome::Failure);
        assert_eq!(JobOutcome::from_provider(""), JobOutcome::Unknown);
    }

    #[test]
    fn test_run_state_mapping() {
        assert_eq!(RemoteRunState::from_provider("queued"), RemoteRunState::Queued);
        assert_eq!(
            RemoteRunState::from_provider("in_progress"),
            RemoteRunState::InProgress
        );
        assert_eq!(
            RemoteRunState::from_provider("completed"),
            RemoteRunState::Completed
        );
        assert_eq!(
            RemoteRunState::from_provider("something_new"),
            RemoteRunState::InProgress
        );
    }

    #[test]
    fn test_folded_status_derives_outcome() {
        let handle = ExternalJobHandle::new("7");
        let failed = RemoteJobStatus::from_provider(handle.clone(), "failed", "", None);
        assert!(failed.is_finished());
        assert_eq!(failed.outcome, JobOutcome::Failure);

        let completed = RemoteJobStatus::from_provider(handle.clone(), "completed", "", None);
        assert!(completed.is_finished());
        assert_eq!(completed.outcome, JobOutcome::Unknown);

        let running = RemoteJobStatus::from_provider(handle, "in_progress", "", None);
        assert!(!running.is_finished());
    }

    #[test]
    fn test_carries_token_in_name_or_metadata() {
        let token = CorrelationToken::from_stored("tasker-abc");
        let by_name = RemoteJob {
            handle: ExternalJobHandle::new("1"),
            name: "deploy tasker-abc".to_string(),
            metadata: HashMap::new(),
            status: "queued".to_string(),
            url: None,
        };
        assert!(by_name.carries_token(&token));

        let by_metadata = RemoteJob {
            name: "deploy".to_string(),
            metadata: HashMap::from([("run-name".to_string(), "tasker-abc".to_string())]),
            ..by_name.clone()
        };
        assert!(by_metadata.carries_token(&token));

        let other = RemoteJob {
            name: "deploy tasker-xyz".to_string(),
            ..by_name
        };
        assert!(!other.carries_token(&token));
    }
}
