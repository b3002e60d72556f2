//! # Completion Reconciler
//!
//! Shared by the notification path and the poll path. Turns an observed remote
//! status into at most one terminal emission per execution:
//!
//! 1. Load the correlation.
//! 2. Settled (completed or finished externally): no-op.
//! 3. Remote job still running: store the observation, no emission.
//! 4. Remote job finished: compare-and-swap `Found -> Completed`; only the caller
//!    whose swap succeeds emits.
//!
//! Because the swap is the only gate, a poll tick and a notification observing the
//! same completion at the same time produce one emission, whatever the interleaving.
//!
//! The swap winner owns the emission. If the sink rejects it the record keeps a
//! pending emission and a poll is scheduled; the next caller that claims it
//! (poll tick or notification) delivers the stored outcome.

use crate::constants::actions;
use crate::error::{ConnectorError, Result};
use crate::events::OutputEmitter;
use crate::models::{ExecutionRef, JobCorrelation, JobOutcome, JobSnapshot, RemoteJobStatus};
use crate::registry::ExecutionStore;
use crate::scheduling::Scheduler;
use crate::state_machine::{CorrelationEvent, CorrelationStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// What a reconciliation call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// This call completed the execution and emitted the outcome
    Emitted(JobOutcome),
    /// Remote job not finished yet; observation stored
    Pending,
    /// Execution already completed or finished; nothing done
    AlreadySettled,
    /// Handle not discovered yet; nothing to reconcile against
    NotReady,
    /// Observation is for a different handle than the one recorded
    HandleMismatch,
    /// No correlation exists for the execution
    UnknownExecution,
}

impl ReconcileOutcome {
    /// Whether the execution needs no further polling
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Emitted(_) | Self::AlreadySettled | Self::UnknownExecution
        )
    }
}

#[derive(Clone)]
pub struct CompletionReconciler {
    executions: Arc<dyn ExecutionStore>,
    emitter: OutputEmitter,
    scheduler: Arc<dyn Scheduler>,
    retry_delay: Duration,
}

impl CompletionReconciler {
    /// `retry_delay` is how long a rejected emission waits before the next poll re-drives it
    pub fn new(
        executions: Arc<dyn ExecutionStore>,
        emitter: OutputEmitter,
        scheduler: Arc<dyn Scheduler>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            executions,
            emitter,
            scheduler,
            retry_delay,
        }
    }

    /// Reconcile one observation of the remote job
    #[instrument(
        skip(self, observed),
        fields(execution_id = %execution, handle = %observed.handle)
    )]
    pub async fn reconcile(
        &self,
        execution: ExecutionRef,
        observed: &RemoteJobStatus,
    ) -> Result<ReconcileOutcome> {
        let Some(correlation) = self.executions.load(execution).await? else {
            warn!("Reconciliation requested for unknown execution");
            return Ok(ReconcileOutcome::UnknownExecution);
        };

        if correlation.has_pending_emission() {
            return self.redeliver(execution, &correlation).await;
        }

        if correlation.is_settled() {
            debug!(
                status = %correlation.status(),
                finished = correlation.is_finished(),
                "Execution already settled; ignoring observation"
            );
            return Ok(ReconcileOutcome::AlreadySettled);
        }

        if correlation.status() != CorrelationStatus::Found {
            debug!(status = %correlation.status(), "Handle not discovered yet");
            return Ok(ReconcileOutcome::NotReady);
        }

        if correlation.handle() != Some(&observed.handle) {
            warn!(
                recorded = ?correlation.handle().map(|h| h.as_str()),
                "Observation handle does not match recorded handle"
            );
            return Ok(ReconcileOutcome::HandleMismatch);
        }

        let snapshot = observed.snapshot();

        if !observed.is_finished() {
            debug!(status = %observed.raw_status, "Remote job still running");
            self.executions
                .record_observation(execution, snapshot)
                .await?;
            return Ok(ReconcileOutcome::Pending);
        }

        self.complete(execution, observed.outcome, snapshot).await
    }

    /// Fail a found execution without a terminal observation (poll budget exhausted).
    /// Goes through the same compare-and-swap as `reconcile`.
    #[instrument(skip(self), fields(execution_id = %execution))]
    pub async fn fail_execution(
        &self,
        execution: ExecutionRef,
        reason: &str,
    ) -> Result<ReconcileOutcome> {
        let Some(correlation) = self.executions.load(execution).await? else {
            return Ok(ReconcileOutcome::UnknownExecution);
        };
        if correlation.has_pending_emission() {
            return self.redeliver(execution, &correlation).await;
        }
        if correlation.is_settled() {
            return Ok(ReconcileOutcome::AlreadySettled);
        }
        let Some(handle) = correlation.handle().cloned() else {
            return Ok(ReconcileOutcome::NotReady);
        };

        let url = correlation.last_observed().and_then(|s| s.url.clone());
        let snapshot = JobSnapshot {
            handle,
            status: reason.to_string(),
            outcome: JobOutcome::Failure,
            url,
            observed_at: Utc::now(),
        };
        self.complete(execution, JobOutcome::Failure, snapshot).await
    }

    async fn complete(
        &self,
        execution: ExecutionRef,
        outcome: JobOutcome,
        snapshot: JobSnapshot,
    ) -> Result<ReconcileOutcome> {
        let won = self
            .executions
            .transition(
                execution,
                CorrelationStatus::Found,
                CorrelationEvent::Complete(outcome),
                Some(snapshot.clone()),
            )
            .await?;

        if won.is_none() {
            debug!("Lost completion race; another caller settled the execution");
            return Ok(ReconcileOutcome::AlreadySettled);
        }

        info!(outcome = %outcome, "Remote job execution completed");
        self.deliver(execution, outcome, &snapshot).await
    }

    /// Deliver the stored outcome of a completed execution whose emission was rejected.
    /// Only the caller that claims the pending emission sends it.
    #[instrument(skip(self, correlation), fields(execution_id = %execution))]
    pub async fn redeliver(
        &self,
        execution: ExecutionRef,
        correlation: &JobCorrelation,
    ) -> Result<ReconcileOutcome> {
        if !self.executions.claim_emission(execution).await? {
            debug!("Pending emission already claimed by another caller");
            return Ok(ReconcileOutcome::AlreadySettled);
        }

        let snapshot = match (correlation.last_observed(), correlation.handle()) {
            (Some(snapshot), _) => snapshot.clone(),
            (None, Some(handle)) => JobSnapshot {
                handle: handle.clone(),
                status: "completed".to_string(),
                outcome: correlation.outcome(),
                url: None,
                observed_at: correlation.completed_at().unwrap_or_else(Utc::now),
            },
            (None, None) => {
                self.release(execution, false).await;
                return Err(ConnectorError::StateTransition(format!(
                    "completed execution {execution} has no handle to report"
                )));
            }
        };

        info!(outcome = %correlation.outcome(), "Re-driving pending emission");
        self.deliver(execution, correlation.outcome(), &snapshot).await
    }

    async fn deliver(
        &self,
        execution: ExecutionRef,
        outcome: JobOutcome,
        snapshot: &JobSnapshot,
    ) -> Result<ReconcileOutcome> {
        if let Err(e) = self.emitter.emit(execution, outcome, snapshot).await {
            warn!(error = %e, "Emission rejected; keeping it pending for the next poll");
            self.release(execution, false).await;
            if let Err(schedule_err) = self
                .scheduler
                .schedule_delayed(execution, actions::POLL, json!({}), self.retry_delay)
                .await
            {
                warn!(error = %schedule_err, "Failed to schedule emission retry");
            }
            return Err(e);
        }

        self.release(execution, true).await;
        if let Err(e) = self.scheduler.cancel(execution, actions::POLL).await {
            warn!(error = %e, "Failed to cancel pending poll after completion");
        }
        Ok(ReconcileOutcome::Emitted(outcome))
    }

    async fn release(&self, execution: ExecutionRef, delivered: bool) {
        if let Err(e) = self.executions.settle_emission(execution, delivered).await {
            warn!(error = %e, delivered, "Failed to record emission state");
        }
    }
}

impl std::fmt::Debug for CompletionReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionReconciler")
            .finish_non_exhaustive()
    }
}
