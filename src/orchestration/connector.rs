//! # Remote Job Connector
//!
//! Wires the dispatcher, discoverer, reconciler, poll scheduler and notification
//! handler around injected collaborators. Hosts construct one connector per
//! remote system and call into it from their execution, request and timer paths.
//!
//! ```rust,ignore
//! let (components, fired) = ConnectorComponents::in_memory(dispatch, listing, status, sink);
//! let connector = Arc::new(RemoteJobConnector::new(components, ConnectorConfig::default()));
//! tokio::spawn(run_scheduled_actions(fired, connector.clone()));
//!
//! let execution = ExecutionRef::new();
//! connector.start(execution, "deploy.yml", json!({"ref": "main"})).await?;
//! ```

use crate::clients::{DispatchClient, ListingClient, StatusClient};
use crate::config::ConnectorConfig;
use crate::constants::actions;
use crate::error::Result;
use crate::events::{EventSink, OutputEmitter};
use crate::models::{CorrelationToken, ExecutionRef, JobCorrelation};
use crate::orchestration::dispatcher::Dispatcher;
use crate::orchestration::handle_discovery::HandleDiscoverer;
use crate::orchestration::notification_handler::{
    AcceptAllVerifier, NotificationDisposition, NotificationHandler, NotificationVerifier,
};
use crate::orchestration::poll_scheduler::{PollScheduler, PollTickOutcome};
use crate::orchestration::reconciler::CompletionReconciler;
use crate::registry::{
    CorrelationStore, ExecutionStore, InMemoryCorrelationStore, InMemoryExecutionStore,
};
use crate::scheduling::{ScheduledAction, ScheduledActionHandler, Scheduler, TokioScheduler};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Collaborators injected into a connector
#[derive(Clone)]
pub struct ConnectorComponents {
    pub dispatch_client: Arc<dyn DispatchClient>,
    pub listing_client: Arc<dyn ListingClient>,
    pub status_client: Arc<dyn StatusClient>,
    pub correlations: Arc<dyn CorrelationStore>,
    pub executions: Arc<dyn ExecutionStore>,
    pub scheduler: Arc<dyn Scheduler>,
    pub event_sink: Arc<dyn EventSink>,
    pub verifier: Arc<dyn NotificationVerifier>,
}

impl ConnectorComponents {
    /// Process-local stores and scheduler around the given remote clients. The
    /// returned receiver must be drained with
    /// [`run_scheduled_actions`](crate::scheduling::run_scheduled_actions).
    pub fn in_memory(
        dispatch_client: Arc<dyn DispatchClient>,
        listing_client: Arc<dyn ListingClient>,
        status_client: Arc<dyn StatusClient>,
        event_sink: Arc<dyn EventSink>,
    ) -> (Self, mpsc::UnboundedReceiver<ScheduledAction>) {
        let (scheduler, receiver) = TokioScheduler::new();
        let components = Self {
            dispatch_client,
            listing_client,
            status_client,
            correlations: Arc::new(InMemoryCorrelationStore::new()),
            executions: Arc::new(InMemoryExecutionStore::new()),
            scheduler,
            event_sink,
            verifier: Arc::new(AcceptAllVerifier),
        };
        (components, receiver)
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn NotificationVerifier>) -> Self {
        self.verifier = verifier;
        self
    }
}

pub struct RemoteJobConnector {
    dispatcher: Dispatcher,
    poller: PollScheduler,
    notifications: NotificationHandler,
    executions: Arc<dyn ExecutionStore>,
    correlations: Arc<dyn CorrelationStore>,
    scheduler: Arc<dyn Scheduler>,
}

impl RemoteJobConnector {
    pub fn new(components: ConnectorComponents, config: ConnectorConfig) -> Self {
        let ConnectorComponents {
            dispatch_client,
            listing_client,
            status_client,
            correlations,
            executions,
            scheduler,
            event_sink,
            verifier,
        } = components;

        let reconciler = CompletionReconciler::new(
            Arc::clone(&executions),
            OutputEmitter::new(event_sink),
            Arc::clone(&scheduler),
            config.polling.interval(),
        );
        let poller = PollScheduler::new(
            status_client,
            Arc::clone(&executions),
            Arc::clone(&scheduler),
            reconciler.clone(),
            config.polling.clone(),
        );
        let discoverer = HandleDiscoverer::new(
            listing_client,
            Arc::clone(&executions),
            Arc::clone(&correlations),
            poller.clone(),
            config.discovery.clone(),
        );
        let dispatcher = Dispatcher::new(dispatch_client, Arc::clone(&executions), discoverer);
        let notifications = NotificationHandler::new(
            verifier,
            Arc::clone(&correlations),
            reconciler,
            config.notifications.clone(),
        );

        info!(
            discovery_attempts = config.discovery.max_attempts,
            poll_interval_seconds = config.polling.interval_seconds,
            "Remote job connector initialized"
        );

        Self {
            dispatcher,
            poller,
            notifications,
            executions,
            correlations,
            scheduler,
        }
    }

    /// Dispatch a job for `execution` and block until its handle is discovered
    pub async fn start(
        &self,
        execution: ExecutionRef,
        reference: &str,
        inputs: Value,
    ) -> Result<JobCorrelation> {
        let token = CorrelationToken::for_execution(&execution);
        self.dispatcher
            .start(token, execution, reference, inputs)
            .await
    }

    /// Inbound push notification entry point
    pub async fn handle_notification(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<NotificationDisposition> {
        self.notifications.handle(signature, body).await
    }

    /// One poll fallback tick
    pub async fn poll(&self, execution: ExecutionRef) -> Result<PollTickOutcome> {
        self.poller.tick(execution).await
    }

    /// Mark an execution finished by the host (e.g. cancelled). Later polls stop and
    /// late notifications become no-ops.
    pub async fn mark_finished(&self, execution: ExecutionRef) -> Result<()> {
        if self.executions.mark_finished(execution).await? {
            info!(execution_id = %execution, "Execution marked finished");
        }
        self.scheduler.cancel(execution, actions::POLL).await
    }

    /// Drop notification routing for an execution the host has disposed of
    pub async fn release(&self, execution: ExecutionRef) -> Result<()> {
        self.correlations.release(execution).await
    }

    pub async fn correlation(&self, execution: ExecutionRef) -> Result<Option<JobCorrelation>> {
        self.executions.load(execution).await
    }

    pub fn notification_handler(&self) -> &NotificationHandler {
        &self.notifications
    }
}

#[async_trait]
impl ScheduledActionHandler for RemoteJobConnector {
    async fn handle_scheduled_action(&self, action: ScheduledAction) -> Result<()> {
        match action.action.as_str() {
            actions::POLL => self.poll(action.execution).await.map(|_| ()),
            other => {
                warn!(
                    execution_id = %action.execution,
                    action = %other,
                    "Dropping unknown scheduled action"
                );
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for RemoteJobConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteJobConnector")
            .field("dispatcher", &self.dispatcher)
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}
