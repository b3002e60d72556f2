use crate::error::{ConnectorError, Result};
use crate::models::{ExecutionRef, ExternalJobHandle};
use crate::registry::CorrelationStore;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgCorrelationStore {
    pool: PgPool,
}

impl PgCorrelationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CorrelationStore for PgCorrelationStore {
    async fn register(&self, handle: &ExternalJobHandle, execution: ExecutionRef) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasker_remote_job_handles (external_handle, execution_id)
            VALUES ($1, $2)
            ON CONFLICT (external_handle) DO NOTHING
            "#,
        )
        .bind(handle.as_str())
        .bind(execution.as_uuid())
        .execute(&self.pool)
        .await?;

        // ON CONFLICT kept the existing row; it must belong to the same execution
        match self.lookup(handle).await? {
            Some(owner) if owner == execution => Ok(()),
            Some(owner) => Err(ConnectorError::Storage(format!(
                "handle {handle} already registered to execution {owner}"
            ))),
            None => Err(ConnectorError::Storage(format!(
                "handle {handle} could not be registered for execution {execution}"
            ))),
        }
    }

    async fn lookup(&self, handle: &ExternalJobHandle) -> Result<Option<ExecutionRef>> {
        let row = sqlx::query(
            "SELECT execution_id FROM tasker_remote_job_handles WHERE external_handle = $1",
        )
        .bind(handle.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row.try_get::<Uuid, _>("execution_id").map(ExecutionRef::from_uuid))
            .transpose()
            .map_err(ConnectorError::from)
    }

    async fn release(&self, execution: ExecutionRef) -> Result<()> {
        sqlx::query("DELETE FROM tasker_remote_job_handles WHERE execution_id = $1")
            .bind(execution.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_register_and_lookup(pool: PgPool) {
        let store = PgCorrelationStore::new(pool);
        let handle = ExternalJobHandle::new("501");
        let execution = ExecutionRef::new();

        assert!(store.lookup(&handle).await.unwrap().is_none());
        store.register(&handle, execution).await.unwrap();
        store.register(&handle, execution).await.unwrap();
        assert_eq!(store.lookup(&handle).await.unwrap(), Some(execution));

        assert!(store.register(&handle, ExecutionRef::new()).await.is_err());

        store.release(execution).await.unwrap();
        assert!(store.lookup(&handle).await.unwrap().is_none());
    }
}
