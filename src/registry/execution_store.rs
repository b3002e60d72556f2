use crate::error::{ConnectorError, Result};
use crate::models::{EmissionState, ExecutionRef, JobCorrelation, JobSnapshot};
use crate::state_machine::{CorrelationEvent, CorrelationStatus};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Storage of execution-owned correlation records.
///
/// `transition` is the only way status changes and it is a compare-and-swap: the
/// event is applied only while the stored status equals `expected` and the
/// execution has not been finished externally. Two callers racing on the same
/// transition therefore see exactly one `Some`.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persist a freshly dispatched correlation. Fails if the execution already has one.
    async fn create(&self, correlation: JobCorrelation) -> Result<()>;

    async fn load(&self, execution: ExecutionRef) -> Result<Option<JobCorrelation>>;

    /// Apply `event` if status is still `expected`. `None` means another caller got
    /// there first or the execution is finished.
    async fn transition(
        &self,
        execution: ExecutionRef,
        expected: CorrelationStatus,
        event: CorrelationEvent,
        observation: Option<JobSnapshot>,
    ) -> Result<Option<JobCorrelation>>;

    /// Store the latest non-terminal observation and clear the poll failure streak
    async fn record_observation(&self, execution: ExecutionRef, snapshot: JobSnapshot)
        -> Result<()>;

    /// Count one failed status fetch; returns the current streak
    async fn record_poll_failure(&self, execution: ExecutionRef) -> Result<u32>;

    /// Flag the execution as finished; returns false if it already was
    async fn mark_finished(&self, execution: ExecutionRef) -> Result<bool>;

    /// Take over a parked emission (`Pending -> InFlight`). Only one caller gets `true`.
    async fn claim_emission(&self, execution: ExecutionRef) -> Result<bool>;

    /// Release an in-flight emission: `Delivered` on success, back to `Pending` otherwise
    async fn settle_emission(&self, execution: ExecutionRef, delivered: bool) -> Result<()>;
}

/// Process-local execution store with one mutex per execution
#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    records: DashMap<ExecutionRef, Arc<Mutex<JobCorrelation>>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, execution: ExecutionRef) -> Result<Arc<Mutex<JobCorrelation>>> {
        self.records
            .get(&execution)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ConnectorError::ExecutionNotFound(execution.to_string()))
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn create(&self, correlation: JobCorrelation) -> Result<()> {
        match self.records.entry(correlation.execution_ref()) {
            Entry::Occupied(_) => Err(ConnectorError::Storage(format!(
                "execution {} already has a job correlation",
                correlation.execution_ref()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(correlation)));
                Ok(())
            }
        }
    }

    async fn load(&self, execution: ExecutionRef) -> Result<Option<JobCorrelation>> {
        Ok(self
            .records
            .get(&execution)
            .map(|entry| entry.value().lock().clone()))
    }

    async fn transition(
        &self,
        execution: ExecutionRef,
        expected: CorrelationStatus,
        event: CorrelationEvent,
        observation: Option<JobSnapshot>,
    ) -> Result<Option<JobCorrelation>> {
        let record = self.record(execution)?;
        let mut correlation = record.lock();

        if correlation.status != expected || correlation.finished {
            return Ok(None);
        }

        correlation.apply(event)?;
        if let Some(snapshot) = observation {
            correlation.last_observed = Some(snapshot);
        }
        Ok(Some(correlation.clone()))
    }

    async fn record_observation(
        &self,
        execution: ExecutionRef,
        snapshot: JobSnapshot,
    ) -> Result<()> {
        let record = self.record(execution)?;
        let mut correlation = record.lock();
        if !correlation.status.is_terminal() {
            correlation.last_observed = Some(snapshot);
            correlation.consecutive_poll_failures = 0;
        }
        Ok(())
    }

    async fn record_poll_failure(&self, execution: ExecutionRef) -> Result<u32> {
        let record = self.record(execution)?;
        let mut correlation = record.lock();
        correlation.consecutive_poll_failures =
            correlation.consecutive_poll_failures.saturating_add(1);
        Ok(correlation.consecutive_poll_failures)
    }

    async fn mark_finished(&self, execution: ExecutionRef) -> Result<bool> {
        let record = self.record(execution)?;
        let mut correlation = record.lock();
        if correlation.finished {
            return Ok(false);
        }
        correlation.finished = true;
        Ok(true)
    }

    async fn claim_emission(&self, execution: ExecutionRef) -> Result<bool> {
        let record = self.record(execution)?;
        let mut correlation = record.lock();
        if correlation.emission != EmissionState::Pending {
            return Ok(false);
        }
        correlation.emission = EmissionState::InFlight;
        Ok(true)
    }

    async fn settle_emission(&self, execution: ExecutionRef, delivered: bool) -> Result<()> {
        let record = self.record(execution)?;
        let mut correlation = record.lock();
        if correlation.emission == EmissionState::InFlight {
            correlation.emission = if delivered {
                EmissionState::Delivered
            } else {
                EmissionState::Pending
            };
        }
        Ok(())
    }
}
