//! # Connector Configuration
//!
//! Typed configuration for the remote job connector. Every section has serde
//! defaults so an empty file (or no file at all) yields a working configuration;
//! [`ConfigManager`] layers YAML files and environment variables on top.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasker_remote_jobs::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let attempts = manager.config().discovery.max_attempts;
//! let interval = manager.config().polling.interval();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{defaults, notifications};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/remote_jobs.yaml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Handle discovery retry policy
    pub discovery: DiscoveryConfig,

    /// Poll fallback settings
    pub polling: PollingConfig,

    /// Inbound notification handling
    pub notifications: NotificationConfig,

    /// Optional PostgreSQL persistence
    pub database: DatabaseConfig,
}

/// Bounded constant-interval retry used to resolve a correlation token into a handle
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub initial_delay_ms: u64,
    pub max_attempts: u32,
    pub retry_interval_ms: u64,
    pub page_size: u32,
}

impl DiscoveryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Worst-case time spent discovering before giving up
    pub fn max_wait(&self) -> Duration {
        self.initial_delay()
            + self.retry_interval() * self.max_attempts.saturating_sub(1)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: defaults::DISCOVERY_INITIAL_DELAY_MS,
            max_attempts: defaults::DISCOVERY_MAX_ATTEMPTS,
            retry_interval_ms: defaults::DISCOVERY_RETRY_INTERVAL_MS,
            page_size: defaults::DISCOVERY_PAGE_SIZE,
        }
    }
}

/// Poll fallback configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
    /// Consecutive status-fetch failures tolerated before the execution is failed.
    /// `0` keeps rescheduling forever.
    pub max_consecutive_failures: u32,
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Whether `failures` consecutive status errors exhaust the budget
    pub fn failure_budget_exhausted(&self, failures: u32) -> bool {
        self.max_consecutive_failures > 0 && failures >= self.max_consecutive_failures
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: defaults::POLL_INTERVAL_SECONDS,
            max_consecutive_failures: defaults::POLL_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

/// Inbound notification configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Notification actions that trigger reconciliation; others are acknowledged and ignored
    pub completed_actions: Vec<String>,
}

impl NotificationConfig {
    pub fn triggers_reconciliation(&self, action: &str) -> bool {
        self.completed_actions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(action))
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            completed_actions: vec![notifications::ACTION_COMPLETED.to_string()],
        }
    }
}

/// Database connection settings for the PostgreSQL-backed stores
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: defaults::DATABASE_MAX_CONNECTIONS,
        }
    }
}

impl ConnectorConfig {
    /// Reject values that would make discovery or polling meaningless
    pub fn validate(&self) -> ConfigResult<()> {
        if self.discovery.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "discovery.max_attempts",
                self.discovery.max_attempts,
                "at least one listing attempt is required",
            ));
        }
        if self.discovery.page_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "discovery.page_size",
                self.discovery.page_size,
                "page size must be positive",
            ));
        }
        if self.polling.interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "polling.interval_seconds",
                self.polling.interval_seconds,
                "poll interval must be positive",
            ));
        }
        if self.notifications.completed_actions.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "completed_actions",
                "notifications",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                self.database.max_connections,
                "connection pool must allow at least one connection",
            ));
        }
        Ok(())
    }
}
