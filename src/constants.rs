//! # Connector Constants
//!
//! Stable names shared between the connector and the workflow engine hosting it:
//! output channels, scheduled action names, correlation keys and lifecycle events.

/// Terminal output channels of an execution
pub mod channels {
    pub const SUCCESS: &str = "success";
    pub const FAILURE: &str = "failure";
}

/// Names of durable scheduled actions
pub mod actions {
    /// Poll fallback tick. Re-scheduling with the same name replaces the pending timer.
    pub const POLL: &str = "poll";
}

/// Correlation lookup keys
pub mod keys {
    pub const EXTERNAL_JOB_HANDLE: &str = "external_job_handle";
}

/// Lifecycle events emitted by the connector
pub mod events {
    pub const REMOTE_JOB_FINISHED: &str = "remote_job.finished";
    pub const REMOTE_JOB_DISPATCHED: &str = "remote_job.dispatched";
    pub const REMOTE_JOB_DISCOVERED: &str = "remote_job.discovered";
}

/// Inbound notification actions
pub mod notifications {
    pub const ACTION_COMPLETED: &str = "completed";
}

/// Operational defaults
pub mod defaults {
    pub const DISCOVERY_INITIAL_DELAY_MS: u64 = 1_000;
    pub const DISCOVERY_MAX_ATTEMPTS: u32 = 15;
    pub const DISCOVERY_RETRY_INTERVAL_MS: u64 = 2_000;
    pub const DISCOVERY_PAGE_SIZE: u32 = 50;
    pub const POLL_INTERVAL_SECONDS: u64 = 300;
    pub const POLL_MAX_CONSECUTIVE_FAILURES: u32 = 0;
    pub const DATABASE_MAX_CONNECTIONS: u32 = 10;
    pub const EVENT_CHANNEL_CAPACITY: usize = 1000;
    /// Prefix of correlation tokens embedded into dispatched jobs
    pub const TOKEN_PREFIX: &str = "tasker";
}
