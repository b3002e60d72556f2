//! # Correlation Registries
//!
//! Two stores back the connector:
//!
//! - [`CorrelationStore`]: weak reverse index `handle -> execution` used only to
//!   route inbound notifications.
//! - [`ExecutionStore`]: the execution-owned [`JobCorrelation`](crate::models::JobCorrelation)
//!   records, with compare-and-swap status transitions.
//!
//! In-memory implementations live here; PostgreSQL ones in [`crate::database`].

pub mod correlation_store;
pub mod execution_store;

pub use correlation_store::{CorrelationStore, InMemoryCorrelationStore};
pub use execution_store::{ExecutionStore, InMemoryExecutionStore};
