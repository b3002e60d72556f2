//! # PostgreSQL Persistence
//!
//! Durable implementations of the connector stores. Correlations live in
//! `tasker_remote_job_correlations`; the routing index lives in
//! `tasker_remote_job_handles`, whose primary key on `external_handle` gives each
//! handle a single owning execution.

pub mod connection;
pub mod correlation_store;
pub mod execution_store;

pub use connection::{connect, run_migrations};
pub use correlation_store::PgCorrelationStore;
pub use execution_store::PgExecutionStore;
