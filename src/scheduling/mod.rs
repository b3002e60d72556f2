//! # Delayed Action Scheduling
//!
//! The connector asks for named callbacks per execution ("poll in five minutes").
//! [`Scheduler`] is the durable task queue contract: at-least-once delivery, and
//! re-scheduling the same `(execution, action)` replaces the pending callback
//! rather than adding a second one. Consumers must be idempotent.
//!
//! [`TokioScheduler`] is the in-process implementation; fired actions are delivered
//! over a channel drained by [`run_scheduled_actions`].

pub mod tokio_scheduler;
pub mod worker;

use crate::error::Result;
use crate::models::ExecutionRef;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub use tokio_scheduler::TokioScheduler;
pub use worker::{run_scheduled_actions, ScheduledActionHandler};

/// A fired (or pending) scheduled callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAction {
    pub execution: ExecutionRef,
    pub action: String,
    pub payload: Value,
    pub due_at: DateTime<Utc>,
}

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Deliver `action` for `execution` after `delay`, replacing any pending one with the same name
    async fn schedule_delayed(
        &self,
        execution: ExecutionRef,
        action: &str,
        payload: Value,
        delay: Duration,
    ) -> Result<()>;

    /// Drop a pending action; unknown actions are ignored
    async fn cancel(&self, execution: ExecutionRef, action: &str) -> Result<()>;
}
