//! Shared fakes for connector integration tests.
//!
//! `FakeRemoteSystem` plays the third-party execution system: dispatch creates a
//! job with sequential handles starting at 1001, listing only shows jobs once a
//! configurable number of listing calls has passed, and status answers come from
//! a per-handle table.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tasker_remote_jobs::config::NotificationConfig;
use tasker_remote_jobs::events::{EmittedEvent, PublishError};
use tasker_remote_jobs::orchestration::NotificationVerifier;
use tasker_remote_jobs::registry::{InMemoryCorrelationStore, InMemoryExecutionStore};
use tasker_remote_jobs::state_machine::CorrelationEvent;
use tasker_remote_jobs::{
    ConnectorComponents, ConnectorConfig, ConnectorError, CorrelationStatus, DiscoveryConfig,
    DispatchClient, DispatchRequest, EventSink, ExecutionRef, ExecutionStore, ExternalJobHandle,
    JobCorrelation, JobSnapshot, ListingClient, PollingConfig, RemoteJob, RemoteJobConnector,
    RemoteJobStatus, Result, Scheduler, StatusClient,
};

pub const FIRST_HANDLE: u64 = 1001;

#[derive(Debug)]
pub struct FakeRemoteSystem {
    jobs: Mutex<Vec<RemoteJob>>,
    statuses: Mutex<HashMap<String, (String, String)>>,
    next_handle: AtomicU64,
    dispatch_fails: AtomicBool,
    status_fails: AtomicBool,
    /// Listing calls that return nothing before dispatched jobs become visible
    hidden_listings: u32,
    pub dispatch_calls: AtomicU32,
    pub listing_calls: AtomicU32,
    pub status_calls: AtomicU32,
}

impl FakeRemoteSystem {
    /// Jobs show up on the first listing call
    pub fn new() -> Self {
        Self::with_hidden_listings(0)
    }

    pub fn with_hidden_listings(hidden_listings: u32) -> Self {
        Self {
            jobs: Mutex::new(vec![RemoteJob {
                handle: ExternalJobHandle::new("42"),
                name: "nightly [tasker-someoneelse]".to_string(),
                metadata: HashMap::new(),
                status: "completed".to_string(),
                url: None,
            }]),
            statuses: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(FIRST_HANDLE),
            dispatch_fails: AtomicBool::new(false),
            status_fails: AtomicBool::new(false),
            hidden_listings,
            dispatch_calls: AtomicU32::new(0),
            listing_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
        }
    }

    /// Dispatched jobs never appear in listings
    pub fn never_listed() -> Self {
        Self::with_hidden_listings(u32::MAX)
    }

    pub fn fail_dispatch(&self) {
        self.dispatch_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_status(&self, failing: bool) {
        self.status_fails.store(failing, Ordering::SeqCst);
    }

    pub fn set_status(&self, handle: &str, status: &str, conclusion: &str) {
        self.statuses
            .lock()
            .insert(handle.to_string(), (status.to_string(), conclusion.to_string()));
    }

    pub fn url_for(handle: &str) -> String {
        format!("https://ci.example.test/runs/{handle}")
    }
}

#[async_trait]
impl DispatchClient for FakeRemoteSystem {
    async fn dispatch(&self, request: &DispatchRequest) -> anyhow::Result<()> {
        self.dispatch_calls.fetch_add(1, Ordering::SeqCst);
        if self.dispatch_fails.load(Ordering::SeqCst) {
            anyhow::bail!("remote system returned 422 for {}", request.reference);
        }

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst).to_string();
        self.jobs.lock().push(RemoteJob {
            handle: ExternalJobHandle::new(handle.clone()),
            name: format!("{} [{}]", request.reference, request.token),
            metadata: HashMap::new(),
            status: "queued".to_string(),
            url: Some(Self::url_for(&handle)),
        });
        self.set_status(&handle, "queued", "");
        Ok(())
    }
}

#[async_trait]
impl ListingClient for FakeRemoteSystem {
    async fn list_recent(&self, page_size: u32) -> anyhow::Result<Vec<RemoteJob>> {
        let call = self.listing_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.hidden_listings {
            return Ok(Vec::new());
        }
        let jobs = self.jobs.lock();
        Ok(jobs.iter().rev().take(page_size as usize).cloned().collect())
    }
}

#[async_trait]
impl StatusClient for FakeRemoteSystem {
    async fn get_status(&self, handle: &ExternalJobHandle) -> anyhow::Result<RemoteJobStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.status_fails.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset while fetching {handle}");
        }
        let statuses = self.statuses.lock();
        let (status, conclusion) = statuses
            .get(handle.as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such job {handle}"))?;
        Ok(RemoteJobStatus::from_provider(
            handle.clone(),
            &status,
            &conclusion,
            Some(Self::url_for(handle.as_str())),
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerCall {
    Schedule {
        execution: ExecutionRef,
        action: String,
        delay: Duration,
    },
    Cancel {
        execution: ExecutionRef,
        action: String,
    },
}

/// Scheduler that records calls and never fires; tests drive polls by hand
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    calls: Mutex<Vec<SchedulerCall>>,
}

impl RecordingScheduler {
    pub fn calls(&self) -> Vec<SchedulerCall> {
        self.calls.lock().clone()
    }

    pub fn schedules_for(&self, execution: ExecutionRef) -> Vec<Duration> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                SchedulerCall::Schedule {
                    execution: e,
                    delay,
                    ..
                } if *e == execution => Some(*delay),
                _ => None,
            })
            .collect()
    }

    pub fn cancels_for(&self, execution: ExecutionRef) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| {
                matches!(call, SchedulerCall::Cancel { execution: e, .. } if *e == execution)
            })
            .count()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn schedule_delayed(
        &self,
        execution: ExecutionRef,
        action: &str,
        _payload: Value,
        delay: Duration,
    ) -> Result<()> {
        self.calls.lock().push(SchedulerCall::Schedule {
            execution,
            action: action.to_string(),
            delay,
        });
        Ok(())
    }

    async fn cancel(&self, execution: ExecutionRef, action: &str) -> Result<()> {
        self.calls.lock().push(SchedulerCall::Cancel {
            execution,
            action: action.to_string(),
        });
        Ok(())
    }
}

/// Event sink that keeps every emission
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<EmittedEvent>>,
    rejections: AtomicU32,
}

impl RecordingEventSink {
    /// Reject the next `count` emissions
    pub fn reject_next(&self, count: u32) {
        self.rejections.store(count, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<EmittedEvent> {
        self.events.lock().clone()
    }

    pub fn events_for_handle(&self, handle: &str) -> Vec<EmittedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.payload["handle"] == json!(handle))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(
        &self,
        channel: &str,
        event_type: &str,
        payload: Value,
    ) -> std::result::Result<(), PublishError> {
        if take_one(&self.rejections) {
            return Err(PublishError::Rejected("downstream unavailable".to_string()));
        }
        self.events.lock().push(EmittedEvent {
            channel: channel.to_string(),
            event_type: event_type.to_string(),
            payload,
            emitted_at: chrono::Utc::now(),
        });
        Ok(())
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// In-memory execution store whose writes can be made to fail on demand
#[derive(Debug, Default)]
pub struct FlakyExecutionStore {
    inner: InMemoryExecutionStore,
    failing_observations: AtomicU32,
    failing_loads: AtomicU32,
}

impl FlakyExecutionStore {
    pub fn fail_next_observations(&self, count: u32) {
        self.failing_observations.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_loads(&self, count: u32) {
        self.failing_loads.store(count, Ordering::SeqCst);
    }

    fn connection_reset() -> ConnectorError {
        ConnectorError::Storage("connection reset".to_string())
    }
}

#[async_trait]
impl ExecutionStore for FlakyExecutionStore {
    async fn create(&self, correlation: JobCorrelation) -> Result<()> {
        self.inner.create(correlation).await
    }

    async fn load(&self, execution: ExecutionRef) -> Result<Option<JobCorrelation>> {
        if take_one(&self.failing_loads) {
            return Err(Self::connection_reset());
        }
        self.inner.load(execution).await
    }

    async fn transition(
        &self,
        execution: ExecutionRef,
        expected: CorrelationStatus,
        event: CorrelationEvent,
        observation: Option<JobSnapshot>,
    ) -> Result<Option<JobCorrelation>> {
        self.inner
            .transition(execution, expected, event, observation)
            .await
    }

    async fn record_observation(
        &self,
        execution: ExecutionRef,
        snapshot: JobSnapshot,
    ) -> Result<()> {
        if take_one(&self.failing_observations) {
            return Err(Self::connection_reset());
        }
        self.inner.record_observation(execution, snapshot).await
    }

    async fn record_poll_failure(&self, execution: ExecutionRef) -> Result<u32> {
        self.inner.record_poll_failure(execution).await
    }

    async fn mark_finished(&self, execution: ExecutionRef) -> Result<bool> {
        self.inner.mark_finished(execution).await
    }

    async fn claim_emission(&self, execution: ExecutionRef) -> Result<bool> {
        self.inner.claim_emission(execution).await
    }

    async fn settle_emission(&self, execution: ExecutionRef, delivered: bool) -> Result<()> {
        self.inner.settle_emission(execution, delivered).await
    }
}

/// Millisecond discovery timings so tests never wait on production delays
pub fn fast_config() -> ConnectorConfig {
    ConnectorConfig {
        discovery: DiscoveryConfig {
            initial_delay_ms: 1,
            max_attempts: 3,
            retry_interval_ms: 1,
            page_size: 20,
        },
        polling: PollingConfig {
            interval_seconds: 300,
            max_consecutive_failures: 0,
        },
        notifications: NotificationConfig::default(),
        ..ConnectorConfig::default()
    }
}

pub struct Harness {
    pub remote: Arc<FakeRemoteSystem>,
    pub scheduler: Arc<RecordingScheduler>,
    pub sink: Arc<RecordingEventSink>,
    pub connector: Arc<RemoteJobConnector>,
}

impl Harness {
    pub fn new(remote: FakeRemoteSystem) -> Self {
        Self::with_config(remote, fast_config(), None)
    }

    pub fn with_config(
        remote: FakeRemoteSystem,
        config: ConnectorConfig,
        verifier: Option<Arc<dyn NotificationVerifier>>,
    ) -> Self {
        Self::build(
            remote,
            config,
            verifier,
            Arc::new(InMemoryExecutionStore::new()),
        )
    }

    pub fn with_store(remote: FakeRemoteSystem, executions: Arc<dyn ExecutionStore>) -> Self {
        Self::build(remote, fast_config(), None, executions)
    }

    fn build(
        remote: FakeRemoteSystem,
        config: ConnectorConfig,
        verifier: Option<Arc<dyn NotificationVerifier>>,
        executions: Arc<dyn ExecutionStore>,
    ) -> Self {
        let remote = Arc::new(remote);
        let scheduler = Arc::new(RecordingScheduler::default());
        let sink = Arc::new(RecordingEventSink::default());

        let mut components = ConnectorComponents {
            dispatch_client: remote.clone(),
            listing_client: remote.clone(),
            status_client: remote.clone(),
            correlations: Arc::new(InMemoryCorrelationStore::new()),
            executions,
            scheduler: scheduler.clone(),
            event_sink: sink.clone(),
            verifier: Arc::new(tasker_remote_jobs::orchestration::AcceptAllVerifier),
        };
        if let Some(verifier) = verifier {
            components = components.with_verifier(verifier);
        }

        Self {
            remote,
            scheduler,
            sink,
            connector: Arc::new(RemoteJobConnector::new(components, config)),
        }
    }

    /// Start an execution and return it with its discovered handle
    pub async fn start_execution(&self) -> (ExecutionRef, String) {
        let execution = ExecutionRef::new();
        let correlation = self
            .connector
            .start(execution, "deploy.yml", json!({"ref": "main"}))
            .await
            .expect("execution should start");
        let handle = correlation
            .handle()
            .expect("handle should be discovered")
            .as_str()
            .to_string();
        (execution, handle)
    }
}

pub fn notification_body(action: &str, handle: &str, status: &str, outcome: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "action": action,
        "job": {
            "handle": handle,
            "status": status,
            "outcome": outcome,
            "url": FakeRemoteSystem::url_for(handle),
        }
    }))
    .expect("notification body serializes")
}

pub fn is_storage_error(result: &Result<impl std::fmt::Debug>) -> bool {
    matches!(result, Err(ConnectorError::Storage(_)))
}
