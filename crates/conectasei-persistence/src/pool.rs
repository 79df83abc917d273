use conectasei_types::error::ConectaError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Open a bounded connection pool against the relational store. Callers
/// hold this once per process and pass clones of the `Arc`-wrapped pool
/// into each repository.
pub async fn connect(database_url: &str) -> Result<PgPool, ConectaError> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(|err| ConectaError::Persistence(format!("failed to connect to database: {err}")))
}
