//! # Dispatcher
//!
//! Issues the one-shot creation call and blocks on handle discovery. Creation has a
//! remote side effect that is not idempotent, so a failed dispatch is never retried:
//! the execution fails and the caller decides what to do.

use crate::clients::{DispatchClient, DispatchRequest};
use crate::constants::events;
use crate::error::{ConnectorError, Result};
use crate::logging::log_execution_operation;
use crate::models::{CorrelationToken, ExecutionRef, JobCorrelation};
use crate::orchestration::handle_discovery::HandleDiscoverer;
use crate::registry::ExecutionStore;
use crate::state_machine::{CorrelationEvent, CorrelationStatus};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument};

#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<dyn DispatchClient>,
    executions: Arc<dyn ExecutionStore>,
    discoverer: HandleDiscoverer,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn DispatchClient>,
        executions: Arc<dyn ExecutionStore>,
        discoverer: HandleDiscoverer,
    ) -> Self {
        Self {
            client,
            executions,
            discoverer,
        }
    }

    /// Create the correlation, dispatch with `token` embedded, and discover the handle.
    ///
    /// The correlation record is created before the remote call, so a second `start`
    /// for the same execution fails without dispatching again.
    #[instrument(skip(self, inputs), fields(execution_id = %execution, token = %token))]
    pub async fn start(
        &self,
        token: CorrelationToken,
        execution: ExecutionRef,
        reference: &str,
        inputs: Value,
    ) -> Result<JobCorrelation> {
        self.executions
            .create(JobCorrelation::dispatched(execution, token.clone()))
            .await?;

        let request = DispatchRequest {
            reference: reference.to_string(),
            inputs,
            token: token.clone(),
        };

        if let Err(e) = self.client.dispatch(&request).await {
            let reason = format!("{e:#}");
            error!(reference = %reference, error = %reason, "Remote job dispatch failed");
            self.fail(execution).await;
            return Err(ConnectorError::DispatchFailed {
                token: token.to_string(),
                reason,
            });
        }

        log_execution_operation(
            events::REMOTE_JOB_DISPATCHED,
            &execution.to_string(),
            None,
            CorrelationStatus::Dispatched.as_str(),
            Some(reference),
        );

        self.executions
            .transition(
                execution,
                CorrelationStatus::Dispatched,
                CorrelationEvent::BeginDiscovery,
                None,
            )
            .await?
            .ok_or_else(|| {
                ConnectorError::StateTransition(format!(
                    "execution {execution} finished before discovery started"
                ))
            })?;

        match self.discoverer.discover_and_register(execution, &token).await {
            Ok(correlation) => {
                info!(
                    handle = ?correlation.handle().map(|h| h.as_str()),
                    "Remote job dispatched and located"
                );
                Ok(correlation)
            }
            Err(e) => {
                error!(error = %e, "Remote job could not be located after dispatch");
                self.fail(execution).await;
                Err(e)
            }
        }
    }

    /// Mark the execution finished after a fatal start failure
    async fn fail(&self, execution: ExecutionRef) {
        if let Err(e) = self.executions.mark_finished(execution).await {
            error!(execution_id = %execution, error = %e, "Failed to mark execution finished");
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("discoverer", &self.discoverer)
            .finish_non_exhaustive()
    }
}
