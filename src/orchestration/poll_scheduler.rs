//! # Poll Scheduler
//!
//! Safety net for notifications that never arrive. After the handle is found a
//! poll is scheduled at a fixed interval; each tick asks the status client and
//! feeds the answer to the reconciler, rescheduling until the execution settles.
//!
//! A failing tick reschedules as well ("not observed yet, try next tick"), whether
//! the status call, the store or the output sink failed. With
//! `polling.max_consecutive_failures > 0` the execution is failed once the streak
//! reaches that bound; with `0` it keeps retrying.

use crate::clients::StatusClient;
use crate::config::PollingConfig;
use crate::constants::actions;
use crate::error::{ConnectorError, Result};
use crate::models::{ExecutionRef, ExternalJobHandle};
use crate::orchestration::reconciler::{CompletionReconciler, ReconcileOutcome};
use crate::registry::ExecutionStore;
use crate::scheduling::Scheduler;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Result of one poll tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollTickOutcome {
    /// Execution settled before or during this tick; no further polls
    Stopped(ReconcileOutcome),
    /// Remote job still running; next poll scheduled
    Rescheduled,
    /// Tick failed; next poll scheduled anyway
    RescheduledAfterError { consecutive_failures: u32 },
}

#[derive(Clone)]
pub struct PollScheduler {
    status: Arc<dyn StatusClient>,
    executions: Arc<dyn ExecutionStore>,
    scheduler: Arc<dyn Scheduler>,
    reconciler: CompletionReconciler,
    config: PollingConfig,
}

impl PollScheduler {
    pub fn new(
        status: Arc<dyn StatusClient>,
        executions: Arc<dyn ExecutionStore>,
        scheduler: Arc<dyn Scheduler>,
        reconciler: CompletionReconciler,
        config: PollingConfig,
    ) -> Self {
        Self {
            status,
            executions,
            scheduler,
            reconciler,
            config,
        }
    }

    /// Schedule the next poll for `execution` after `delay`
    pub async fn schedule_poll(&self, execution: ExecutionRef, delay: Duration) -> Result<()> {
        self.scheduler
            .schedule_delayed(execution, actions::POLL, json!({}), delay)
            .await
    }

    /// First poll after the handle is found
    pub async fn schedule_first_poll(&self, execution: ExecutionRef) -> Result<()> {
        self.schedule_poll(execution, self.config.interval()).await
    }

    /// Run one poll tick.
    ///
    /// Any retryable error while the execution is unsettled (status call, storage,
    /// emission) counts against the failure streak and reschedules, so the loop
    /// only ends once the execution settles. `Err` is left for fatal errors and for
    /// a scheduler that cannot take the next poll.
    #[instrument(skip(self), fields(execution_id = %execution))]
    pub async fn tick(&self, execution: ExecutionRef) -> Result<PollTickOutcome> {
        let correlation = match self.executions.load(execution).await {
            Ok(Some(correlation)) => correlation,
            Ok(None) => {
                warn!("Poll tick for unknown execution; not rescheduling");
                return Ok(PollTickOutcome::Stopped(ReconcileOutcome::UnknownExecution));
            }
            Err(e) => return self.retry_after_error(execution, e).await,
        };

        if correlation.has_pending_emission() {
            return match self.reconciler.redeliver(execution, &correlation).await {
                Ok(outcome) => Ok(PollTickOutcome::Stopped(outcome)),
                Err(e) => self.retry_after_error(execution, e).await,
            };
        }

        if correlation.is_settled() {
            debug!(
                status = %correlation.status(),
                finished = correlation.is_finished(),
                "Execution settled; poll loop stops"
            );
            return Ok(PollTickOutcome::Stopped(ReconcileOutcome::AlreadySettled));
        }

        let Some(handle) = correlation.handle().cloned() else {
            return Err(ConnectorError::StateTransition(format!(
                "poll tick for execution {execution} before its handle was discovered"
            )));
        };

        match self.observe(execution, &handle).await {
            Ok(outcome) if outcome.is_settled() => Ok(PollTickOutcome::Stopped(outcome)),
            Ok(_) => {
                self.schedule_poll(execution, self.config.interval()).await?;
                Ok(PollTickOutcome::Rescheduled)
            }
            Err(e) => self.retry_after_error(execution, e).await,
        }
    }

    async fn observe(
        &self,
        execution: ExecutionRef,
        handle: &ExternalJobHandle,
    ) -> Result<ReconcileOutcome> {
        let observed = self
            .status
            .get_status(handle)
            .await
            .map_err(|e| ConnectorError::remote("get_status", &e))?;
        self.reconciler.reconcile(execution, &observed).await
    }

    async fn retry_after_error(
        &self,
        execution: ExecutionRef,
        error: ConnectorError,
    ) -> Result<PollTickOutcome> {
        if error.is_fatal() {
            return Err(error);
        }

        let consecutive_failures = match self.executions.record_poll_failure(execution).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Failed to record poll failure");
                0
            }
        };
        warn!(consecutive_failures, error = %error, "Poll tick failed");

        if self.config.failure_budget_exhausted(consecutive_failures) {
            let reason = format!(
                "status unavailable after {consecutive_failures} consecutive poll failures"
            );
            match self.reconciler.fail_execution(execution, &reason).await {
                Ok(outcome) if outcome.is_settled() => {
                    return Ok(PollTickOutcome::Stopped(outcome));
                }
                Ok(outcome) => debug!(?outcome, "Execution could not be failed yet"),
                Err(e) => warn!(error = %e, "Failed to fail execution after poll failures"),
            }
        }

        self.schedule_poll(execution, self.config.interval()).await?;
        Ok(PollTickOutcome::RescheduledAfterError {
            consecutive_failures,
        })
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
