//! # Data Model
//!
//! Identifiers, the per-execution [`JobCorrelation`] aggregate, remote job
//! observations and the inbound notification payload.

pub mod correlation;
pub mod identifiers;
pub mod notification;
pub mod remote_job;

pub use correlation::{EmissionState, JobCorrelation};
pub use identifiers::{CorrelationToken, ExecutionRef, ExternalJobHandle};
pub use notification::{NotificationJob, NotificationPayload};
pub use remote_job::{JobOutcome, JobSnapshot, RemoteJob, RemoteJobStatus, RemoteRunState};
