//! # Job Correlation
//!
//! The aggregate owned by one execution attempt: the correlation token embedded at
//! dispatch, the handle once discovered, the lifecycle status and the outcome.
//!
//! Status only moves forward and the handle is written once; both are enforced by
//! [`JobCorrelation::apply`], the only mutator of `status`.

use super::identifiers::{CorrelationToken, ExecutionRef, ExternalJobHandle};
use super::remote_job::{JobOutcome, JobSnapshot};
use crate::state_machine::{
    determine_target_state, CorrelationEvent, CorrelationStatus, StateMachineError,
    StateMachineResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery of the terminal emission. Completion hands the emission to the
/// caller that won the completion swap (`InFlight`); a failed delivery parks it
/// as `Pending` until one later caller claims it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionState {
    #[default]
    NotDue,
    InFlight,
    Pending,
    Delivered,
}

impl EmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotDue => "not_due",
            Self::InFlight => "in_flight",
            Self::Pending => "pending",
            Self::Delivered => "delivered",
        }
    }
}

impl std::fmt::Display for EmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmissionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_due" => Ok(Self::NotDue),
            "in_flight" => Ok(Self::InFlight),
            "pending" => Ok(Self::Pending),
            "delivered" => Ok(Self::Delivered),
            _ => Err(format!("Invalid emission state: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCorrelation {
    pub(crate) execution_ref: ExecutionRef,
    pub(crate) token: CorrelationToken,
    pub(crate) handle: Option<ExternalJobHandle>,
    pub(crate) status: CorrelationStatus,
    pub(crate) outcome: JobOutcome,
    pub(crate) dispatched_at: DateTime<Utc>,
    pub(crate) discovered_at: Option<DateTime<Utc>>,
    pub(crate) completed_at: Option<DateTime<Utc>>,
    /// Set when the owning execution finished by other means (e.g. cancelled)
    pub(crate) finished: bool,
    pub(crate) last_observed: Option<JobSnapshot>,
    pub(crate) consecutive_poll_failures: u32,
    #[serde(default)]
    pub(crate) emission: EmissionState,
}

impl JobCorrelation {
    /// New correlation for an accepted dispatch
    pub fn dispatched(execution_ref: ExecutionRef, token: CorrelationToken) -> Self {
        Self {
            execution_ref,
            token,
            handle: None,
            status: CorrelationStatus::Dispatched,
            outcome: JobOutcome::Unknown,
            dispatched_at: Utc::now(),
            discovered_at: None,
            completed_at: None,
            finished: false,
            last_observed: None,
            consecutive_poll_failures: 0,
            emission: EmissionState::NotDue,
        }
    }

    /// Apply a lifecycle event, enforcing forward-only status and write-once handle
    pub fn apply(&mut self, event: CorrelationEvent) -> StateMachineResult<CorrelationStatus> {
        let target = determine_target_state(self.status, &event)?;

        match event {
            CorrelationEvent::BeginDiscovery => {}
            CorrelationEvent::HandleDiscovered(handle) => {
                if let Some(existing) = &self.handle {
                    return Err(StateMachineError::HandleAlreadySet {
                        existing: existing.to_string(),
                    });
                }
                self.handle = Some(handle);
                self.discovered_at = Some(Utc::now());
            }
            CorrelationEvent::Complete(outcome) => {
                self.outcome = outcome;
                self.completed_at = Some(Utc::now());
                self.emission = EmissionState::InFlight;
            }
        }

        self.status = target;
        Ok(target)
    }

    /// Whether reconciliation must be skipped for this execution
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal() || self.finished
    }

    pub fn execution_ref(&self) -> ExecutionRef {
        self.execution_ref
    }

    pub fn token(&self) -> &CorrelationToken {
        &self.token
    }

    pub fn handle(&self) -> Option<&ExternalJobHandle> {
        self.handle.as_ref()
    }

    pub fn status(&self) -> CorrelationStatus {
        self.status
    }

    pub fn outcome(&self) -> JobOutcome {
        self.outcome
    }

    pub fn dispatched_at(&self) -> DateTime<Utc> {
        self.dispatched_at
    }

    pub fn discovered_at(&self) -> Option<DateTime<Utc>> {
        self.discovered_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn last_observed(&self) -> Option<&JobSnapshot> {
        self.last_observed.as_ref()
    }

    pub fn consecutive_poll_failures(&self) -> u32 {
        self.consecutive_poll_failures
    }

    pub fn emission(&self) -> EmissionState {
        self.emission
    }

    /// Completed, but the terminal emission still has to be delivered. Executions
    /// the host has finished are not re-driven.
    pub fn has_pending_emission(&self) -> bool {
        self.emission == EmissionState::Pending && !self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found_correlation() -> JobCorrelation {
        let execution = ExecutionRef::new();
        let mut correlation =
            JobCorrelation::dispatched(execution, CorrelationToken::for_execution(&execution));
        correlation.apply(CorrelationEvent::BeginDiscovery).unwrap();
        correlation
            .apply(CorrelationEvent::HandleDiscovered(ExternalJobHandle::new("99")))
            .unwrap();
        correlation
    }

    #[test]
    fn test_discovery_records_handle_and_timestamp() {
        let correlation = found_correlation();
        assert_eq!(correlation.status(), CorrelationStatus::Found);
        assert_eq!(correlation.handle().unwrap().as_str(), "99");
        assert!(correlation.discovered_at().is_some());
        assert!(correlation.completed_at().is_none());
    }

    #[test]
    fn test_completion_is_terminal() {
        let mut correlation = found_correlation();
        correlation
            .apply(CorrelationEvent::Complete(JobOutcome::Success))
            .unwrap();
        assert!(correlation.is_settled());
        assert_eq!(correlation.outcome(), JobOutcome::Success);
        assert_eq!(correlation.emission(), EmissionState::InFlight);
        assert!(!correlation.has_pending_emission());

        let again = correlation.apply(CorrelationEvent::Complete(JobOutcome::Failure));
        assert!(again.is_err());
        assert_eq!(correlation.outcome(), JobOutcome::Success);
    }

    #[test]
    fn test_handle_is_write_once() {
        let mut correlation = found_correlation();
        let err = correlation
            .apply(CorrelationEvent::HandleDiscovered(ExternalJobHandle::new("100")))
            .unwrap_err();
        assert!(matches!(err, StateMachineError::InvalidTransition { .. }));
        assert_eq!(correlation.handle().unwrap().as_str(), "99");
    }
}
