//! # Remote Job Orchestration
//!
//! Dispatch, handle discovery and completion reconciliation for jobs run by a
//! third-party execution system.
//!
//! ## Flow
//!
//! ```text
//! Dispatcher ──> HandleDiscoverer ──> CorrelationStore.register + first poll
//!                                             │
//!        NotificationHandler ──┐              │
//!                              ├──> CompletionReconciler ──> OutputEmitter
//!        PollScheduler ────────┘
//! ```
//!
//! The notification path and the poll path run concurrently in any interleaving;
//! the reconciler's compare-and-swap on the correlation status admits exactly one
//! terminal emission per execution.

pub mod connector;
pub mod dispatcher;
pub mod handle_discovery;
pub mod notification_handler;
pub mod poll_scheduler;
pub mod reconciler;

pub use connector::{ConnectorComponents, RemoteJobConnector};
pub use dispatcher::Dispatcher;
pub use handle_discovery::{DiscoveredJob, HandleDiscoverer};
pub use notification_handler::{
    AcceptAllVerifier, NotificationDisposition, NotificationHandler, NotificationVerifier,
    RejectionKind, VerificationError,
};
pub use poll_scheduler::{PollScheduler, PollTickOutcome};
pub use reconciler::{CompletionReconciler, ReconcileOutcome};
