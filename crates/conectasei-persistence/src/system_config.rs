//! `system_config` table repository — a flat key/value store for settings
//! that change at runtime without a deploy, e.g. a global kill switch.
//!
//! ```sql
//! CREATE TABLE system_config (
//!     key TEXT PRIMARY KEY,
//!     value JSONB NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use conectasei_types::domain::SystemConfig;
use conectasei_types::error::ConectaError;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;

#[derive(sqlx::FromRow)]
struct SystemConfigRow {
    key: String,
    value: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl From<SystemConfigRow> for SystemConfig {
    fn from(row: SystemConfigRow) -> Self {
        SystemConfig {
            key: row.key,
            value: row.value,
            updated_at: row.updated_at,
        }
    }
}

pub struct SystemConfigRepository {
    pool: Arc<PgPool>,
}

impl SystemConfigRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<SystemConfig>, ConectaError> {
        let row = sqlx::query_as::<_, SystemConfigRow>(
            "SELECT * FROM system_config WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("get system config: {err}")))?;
        Ok(row.map(SystemConfig::from))
    }

    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), ConectaError> {
        sqlx::query(
            r#"
            INSERT INTO system_config (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("set system config: {err}")))?;
        Ok(())
    }
}
