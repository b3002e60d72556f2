//! # Remote System Collaborators
//!
//! Provider-specific REST clients live outside this crate. The connector only sees
//! these three seams; errors are opaque (`anyhow`) and are classified by the caller.

use crate::models::{CorrelationToken, ExternalJobHandle, RemoteJob, RemoteJobStatus};
use async_trait::async_trait;
use serde_json::Value;

/// What to run remotely. `reference` names the pipeline/workflow, `inputs` are its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub reference: String,
    pub inputs: Value,
    /// Must end up in the created job's name or metadata
    pub token: CorrelationToken,
}

/// Fire-and-forget job creation. Returns no handle.
#[async_trait]
pub trait DispatchClient: Send + Sync {
    async fn dispatch(&self, request: &DispatchRequest) -> anyhow::Result<()>;
}

/// Recent jobs, newest first, with enough name/metadata to match a correlation token
#[async_trait]
pub trait ListingClient: Send + Sync {
    async fn list_recent(&self, page_size: u32) -> anyhow::Result<Vec<RemoteJob>>;
}

/// Direct status lookup for a known handle
#[async_trait]
pub trait StatusClient: Send + Sync {
    async fn get_status(&self, handle: &ExternalJobHandle) -> anyhow::Result<RemoteJobStatus>;
}
