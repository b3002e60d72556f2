use crate::error::{ConnectorError, Result};
use crate::models::{
    CorrelationToken, EmissionState, ExecutionRef, ExternalJobHandle, JobCorrelation, JobOutcome,
    JobSnapshot,
};
use crate::registry::ExecutionStore;
use crate::state_machine::{CorrelationEvent, CorrelationStatus, StateMachineError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const SELECT_COLUMNS: &str = r#"
    execution_id, correlation_token, external_handle, status, outcome, finished, emission,
    last_observed, consecutive_poll_failures, dispatched_at, discovered_at, completed_at
"#;

/// Correlation records in PostgreSQL. Transitions lock the row (`FOR UPDATE`) and
/// re-check the expected status inside the transaction, so concurrent callers
/// serialize per execution and only one of them observes its expected status.
#[derive(Debug, Clone)]
pub struct PgExecutionStore {
    pool: PgPool,
}

impl PgExecutionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &PgRow) -> Result<JobCorrelation> {
        let execution_id: Uuid = row.try_get("execution_id")?;
        let token: String = row.try_get("correlation_token")?;
        let handle: Option<String> = row.try_get("external_handle")?;
        let status: String = row.try_get("status")?;
        let outcome: String = row.try_get("outcome")?;
        let emission: String = row.try_get("emission")?;
        let last_observed: Option<serde_json::Value> = row.try_get("last_observed")?;
        let failures: i32 = row.try_get("consecutive_poll_failures")?;

        let status = status
            .parse::<CorrelationStatus>()
            .map_err(StateMachineError::InvalidStoredState)?;
        let outcome = outcome
            .parse::<JobOutcome>()
            .map_err(StateMachineError::InvalidStoredState)?;
        let emission = emission
            .parse::<EmissionState>()
            .map_err(StateMachineError::InvalidStoredState)?;
        let last_observed = last_observed
            .map(serde_json::from_value::<JobSnapshot>)
            .transpose()
            .map_err(|e| ConnectorError::Storage(format!("invalid last_observed: {e}")))?;

        Ok(JobCorrelation {
            execution_ref: ExecutionRef::from_uuid(execution_id),
            token: CorrelationToken::from_stored(token),
            handle: handle.map(ExternalJobHandle::new),
            status,
            outcome,
            dispatched_at: row.try_get::<DateTime<Utc>, _>("dispatched_at")?,
            discovered_at: row.try_get("discovered_at")?,
            completed_at: row.try_get("completed_at")?,
            finished: row.try_get("finished")?,
            emission,
            last_observed,
            consecutive_poll_failures: u32::try_from(failures).unwrap_or_default(),
        })
    }

    fn snapshot_json(snapshot: Option<&JobSnapshot>) -> Result<Option<serde_json::Value>> {
        snapshot
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ConnectorError::Storage(format!("invalid snapshot: {e}")))
    }
}

#[async_trait]
impl ExecutionStore for PgExecutionStore {
    async fn create(&self, correlation: JobCorrelation) -> Result<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO tasker_remote_job_correlations
                (execution_id, correlation_token, status, outcome, dispatched_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (execution_id) DO NOTHING
            "#,
        )
        .bind(correlation.execution_ref().as_uuid())
        .bind(correlation.token().as_str())
        .bind(correlation.status().as_str())
        .bind(correlation.outcome().as_str())
        .bind(correlation.dispatched_at())
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(ConnectorError::Storage(format!(
                "execution {} already has a job correlation",
                correlation.execution_ref()
            )));
        }
        Ok(())
    }

    async fn load(&self, execution: ExecutionRef) -> Result<Option<JobCorrelation>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM tasker_remote_job_correlations WHERE execution_id = $1"
        ))
        .bind(execution.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn transition(
        &self,
        execution: ExecutionRef,
        expected: CorrelationStatus,
        event: CorrelationEvent,
        observation: Option<JobSnapshot>,
    ) -> Result<Option<JobCorrelation>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM tasker_remote_job_correlations \
             WHERE execution_id = $1 FOR UPDATE"
        ))
        .bind(execution.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(ConnectorError::ExecutionNotFound(execution.to_string()));
        };
        let mut correlation = Self::from_row(&row)?;

        if correlation.status() != expected || correlation.is_finished() {
            tx.rollback().await?;
            return Ok(None);
        }

        correlation.apply(event)?;
        if let Some(snapshot) = observation {
            correlation.last_observed = Some(snapshot);
        }

        let updated = sqlx::query(
            r#"
            UPDATE tasker_remote_job_correlations
            SET status = $2,
                outcome = $3,
                external_handle = $4,
                discovered_at = $5,
                completed_at = $6,
                last_observed = $7,
                emission = $9,
                updated_at = NOW()
            WHERE execution_id = $1 AND status = $8 AND finished = FALSE
            "#,
        )
        .bind(execution.as_uuid())
        .bind(correlation.status().as_str())
        .bind(correlation.outcome().as_str())
        .bind(correlation.handle().map(|h| h.as_str().to_string()))
        .bind(correlation.discovered_at())
        .bind(correlation.completed_at())
        .bind(Self::snapshot_json(correlation.last_observed())?)
        .bind(expected.as_str())
        .bind(correlation.emission().as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(correlation))
    }

    async fn record_observation(
        &self,
        execution: ExecutionRef,
        snapshot: JobSnapshot,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tasker_remote_job_correlations
            SET last_observed = $2, consecutive_poll_failures = 0, updated_at = NOW()
            WHERE execution_id = $1 AND status <> 'completed'
            "#,
        )
        .bind(execution.as_uuid())
        .bind(Self::snapshot_json(Some(&snapshot))?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_poll_failure(&self, execution: ExecutionRef) -> Result<u32> {
        let row = sqlx::query(
            r#"
            UPDATE tasker_remote_job_correlations
            SET consecutive_poll_failures = consecutive_poll_failures + 1, updated_at = NOW()
            WHERE execution_id = $1
            RETURNING consecutive_poll_failures
            "#,
        )
        .bind(execution.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ConnectorError::ExecutionNotFound(execution.to_string()))?;

        let failures: i32 = row.try_get("consecutive_poll_failures")?;
        Ok(u32::try_from(failures).unwrap_or_default())
    }

    async fn mark_finished(&self, execution: ExecutionRef) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE tasker_remote_job_correlations
            SET finished = TRUE, updated_at = NOW()
            WHERE execution_id = $1 AND finished = FALSE
            "#,
        )
        .bind(execution.as_uuid())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() > 0 {
            return Ok(true);
        }

        let exists = sqlx::query(
            "SELECT 1 AS present FROM tasker_remote_job_correlations WHERE execution_id = $1",
        )
        .bind(execution.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match exists {
            Some(_) => Ok(false),
            None => Err(ConnectorError::ExecutionNotFound(execution.to_string())),
        }
    }

    async fn claim_emission(&self, execution: ExecutionRef) -> Result<bool> {
        let claimed = sqlx::query(
            r#"
            UPDATE tasker_remote_job_correlations
            SET emission = 'in_flight', updated_at = NOW()
            WHERE execution_id = $1 AND emission = 'pending'
            "#,
        )
        .bind(execution.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(claimed.rows_affected() > 0)
    }

    async fn settle_emission(&self, execution: ExecutionRef, delivered: bool) -> Result<()> {
        let next = if delivered {
            EmissionState::Delivered
        } else {
            EmissionState::Pending
        };
        sqlx::query(
            r#"
            UPDATE tasker_remote_job_correlations
            SET emission = $2, updated_at = NOW()
            WHERE execution_id = $1 AND emission = 'in_flight'
            "#,
        )
        .bind(execution.as_uuid())
        .bind(next.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
