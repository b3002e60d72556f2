#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

//! # Tasker Remote Jobs
//!
//! Connector that runs long-lived jobs in a third-party execution system (a CI
//! pipeline, a batch service) on behalf of a Tasker workflow execution and reports
//! the result back exactly once.
//!
//! ## Overview
//!
//! The remote API creates jobs without returning a handle, and completion can
//! arrive by push notification (maybe never, maybe twice) or be found by a local
//! poll fallback. This crate covers the hard part in between:
//!
//! - **Dispatch**: one-shot creation with a correlation token embedded in the job
//! - **Handle discovery**: bounded constant-interval scan of recent jobs for the token
//! - **Completion reconciliation**: one compare-and-swap gate shared by the
//!   notification path and the poll path, so exactly one terminal emission happens
//! - **Output**: `success` or `failure` channel carrying the last known job metadata
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Dispatcher, discoverer, reconciler, poller, notification handler
//! - [`registry`] - Correlation and execution store traits with in-memory implementations
//! - [`database`] - PostgreSQL store implementations (feature `postgres`)
//! - [`scheduling`] - Delayed action scheduling and the action worker
//! - [`events`] - Event sink and output emitter
//! - [`clients`] - Remote system collaborator traits
//! - [`state_machine`] - Correlation lifecycle rules
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`web`] - Inbound notification HTTP endpoint (feature `web`)
//!
//! ## Testing
//!
//! ```bash
//! cargo test                      # unit + integration tests
//! cargo test -- --ignored         # PostgreSQL store tests (needs DATABASE_URL)
//! cargo test --features web       # HTTP endpoint tests
//! ```

pub mod clients;
pub mod config;
pub mod constants;
#[cfg(feature = "postgres")]
pub mod database;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod scheduling;
pub mod state_machine;
#[cfg(feature = "web")]
pub mod web;

pub use clients::{DispatchClient, DispatchRequest, ListingClient, StatusClient};
pub use crate::config::{ConfigManager, ConnectorConfig, DiscoveryConfig, PollingConfig};
pub use error::{ConnectorError, Result};
pub use events::{BroadcastEventSink, EventSink, OutputEmitter};
pub use models::{
    CorrelationToken, EmissionState, ExecutionRef, ExternalJobHandle, JobCorrelation, JobOutcome,
    JobSnapshot, RemoteJob, RemoteJobStatus, RemoteRunState,
};
pub use orchestration::{
    ConnectorComponents, NotificationDisposition, PollTickOutcome, ReconcileOutcome,
    RemoteJobConnector,
};
pub use registry::{CorrelationStore, ExecutionStore};
pub use scheduling::{run_scheduled_actions, Scheduler, TokioScheduler};
pub use state_machine::CorrelationStatus;
