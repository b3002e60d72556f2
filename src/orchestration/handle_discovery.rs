//! # Handle Discovery
//!
//! The remote API answers a dispatch without telling us which job it created, so
//! the job is found again by scanning recent jobs for the correlation token.
//! Listing is eventually consistent: the scan is retried at a constant interval a
//! bounded number of times, and running out of attempts fails the execution.

use crate::clients::ListingClient;
use crate::config::DiscoveryConfig;
use crate::constants::events;
use crate::error::{ConnectorError, Result};
use crate::logging::log_execution_operation;
use crate::models::{CorrelationToken, ExecutionRef, ExternalJobHandle, JobCorrelation, RemoteJob};
use crate::orchestration::poll_scheduler::PollScheduler;
use crate::registry::{CorrelationStore, ExecutionStore};
use crate::state_machine::{CorrelationEvent, CorrelationStatus};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A located remote job
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredJob {
    pub job: RemoteJob,
    /// 1-based listing attempt that found it
    pub attempt: u32,
}

impl DiscoveredJob {
    pub fn handle(&self) -> &ExternalJobHandle {
        &self.job.handle
    }
}

#[derive(Clone)]
pub struct HandleDiscoverer {
    listing: Arc<dyn ListingClient>,
    executions: Arc<dyn ExecutionStore>,
    correlations: Arc<dyn CorrelationStore>,
    poller: PollScheduler,
    config: DiscoveryConfig,
}

impl HandleDiscoverer {
    pub fn new(
        listing: Arc<dyn ListingClient>,
        executions: Arc<dyn ExecutionStore>,
        correlations: Arc<dyn CorrelationStore>,
        poller: PollScheduler,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            listing,
            executions,
            correlations,
            poller,
            config,
        }
    }

    /// Scan recent jobs for `token` under the bounded retry policy.
    ///
    /// Listing errors count as a spent attempt; the budget is never exceeded.
    #[instrument(skip(self), fields(token = %token))]
    pub async fn discover(&self, token: &CorrelationToken) -> Result<DiscoveredJob> {
        tokio::time::sleep(self.config.initial_delay()).await;

        for attempt in 1..=self.config.max_attempts {
            match self.listing.list_recent(self.config.page_size).await {
                Ok(jobs) => {
                    let scanned = jobs.len();
                    if let Some(job) = jobs.into_iter().find(|job| job.carries_token(token)) {
                        debug!(attempt, handle = %job.handle, "Correlation token matched");
                        return Ok(DiscoveredJob { job, attempt });
                    }
                    debug!(attempt, scanned, "No job carries the correlation token yet");
                }
                Err(e) => {
                    let err = ConnectorError::remote("list_recent", &e);
                    warn!(attempt, error = %err, "Listing recent jobs failed");
                }
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.config.retry_interval()).await;
            }
        }

        Err(ConnectorError::HandleNotFound {
            token: token.to_string(),
            attempts: self.config.max_attempts,
        })
    }

    /// Discover the handle for a correlation in `Discovering`, then record it:
    /// status moves to `Found`, the handle is registered for notification routing
    /// and the first poll is scheduled.
    #[instrument(skip(self, token), fields(execution_id = %execution))]
    pub async fn discover_and_register(
        &self,
        execution: ExecutionRef,
        token: &CorrelationToken,
    ) -> Result<JobCorrelation> {
        let discovered = self.discover(token).await?;
        let handle = discovered.handle().clone();

        let snapshot = crate::models::RemoteJobStatus::from_provider(
            handle.clone(),
            &discovered.job.status,
            "",
            discovered.job.url.clone(),
        )
        .snapshot();

        let correlation = self
            .executions
            .transition(
                execution,
                CorrelationStatus::Discovering,
                CorrelationEvent::HandleDiscovered(handle.clone()),
                Some(snapshot),
            )
            .await?
            .ok_or_else(|| {
                ConnectorError::StateTransition(format!(
                    "execution {execution} left discovery before handle {handle} was recorded"
                ))
            })?;

        self.correlations.register(&handle, execution).await?;
        self.poller.schedule_first_poll(execution).await?;

        info!(
            handle = %handle,
            attempt = discovered.attempt,
            "Remote job handle discovered"
        );
        log_execution_operation(
            events::REMOTE_JOB_DISCOVERED,
            &execution.to_string(),
            Some(handle.as_str()),
            correlation.status().as_str(),
            None,
        );

        Ok(correlation)
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }
}

impl std::fmt::Debug for HandleDiscoverer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleDiscoverer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
