use crate::config::DatabaseConfig;
use crate::error::{ConnectorError, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;

/// Open a pool from configuration, falling back to `DATABASE_URL`
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let database_url = match &config.url {
        Some(url) => url.clone(),
        None => std::env::var("DATABASE_URL").map_err(|_| {
            ConnectorError::Configuration(
                "database.url is not set and DATABASE_URL is not defined".to_string(),
            )
        })?,
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&database_url)
        .await?;

    info!(
        max_connections = config.max_connections,
        "Connected remote job stores to PostgreSQL"
    );
    Ok(pool)
}

/// Apply the bundled schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| ConnectorError::Storage(format!("migration failed: {e}")))
}

pub async fn health_check(pool: &PgPool) -> Result<bool> {
    let row = sqlx::query("SELECT 1 as health").fetch_one(pool).await?;
    let health: i32 = row.try_get("health")?;
    Ok(health == 1)
}
