use crate::constants::keys;
use crate::error::{ConnectorError, Result};
use crate::models::{ExecutionRef, ExternalJobHandle};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Routing table from remote job handle to the execution that dispatched it
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Register `handle` for `execution`. Re-registering the same pair is a no-op;
    /// a handle already owned by another execution is an error.
    async fn register(&self, handle: &ExternalJobHandle, execution: ExecutionRef) -> Result<()>;

    /// Resolve a handle. `None` is a normal answer for jobs this system never dispatched.
    async fn lookup(&self, handle: &ExternalJobHandle) -> Result<Option<ExecutionRef>>;

    /// Drop routing entries of a finished execution
    async fn release(&self, execution: ExecutionRef) -> Result<()>;
}

/// Process-local correlation store
#[derive(Debug, Default)]
pub struct InMemoryCorrelationStore {
    handles: DashMap<ExternalJobHandle, ExecutionRef>,
}

impl InMemoryCorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[async_trait]
impl CorrelationStore for InMemoryCorrelationStore {
    async fn register(&self, handle: &ExternalJobHandle, execution: ExecutionRef) -> Result<()> {
        match self.handles.entry(handle.clone()) {
            Entry::Occupied(existing) if *existing.get() == execution => Ok(()),
            Entry::Occupied(existing) => Err(ConnectorError::Storage(format!(
                "handle {handle} already registered to execution {}",
                existing.get()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(execution);
                debug!(
                    key = keys::EXTERNAL_JOB_HANDLE,
                    handle = %handle,
                    execution_id = %execution,
                    "Registered job handle"
                );
                Ok(())
            }
        }
    }

    async fn lookup(&self, handle: &ExternalJobHandle) -> Result<Option<ExecutionRef>> {
        Ok(self.handles.get(handle).map(|entry| *entry.value()))
    }

    async fn release(&self, execution: ExecutionRef) -> Result<()> {
        self.handles.retain(|_, owner| *owner != execution);
        Ok(())
    }
}
