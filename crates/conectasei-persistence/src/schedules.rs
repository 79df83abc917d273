//! `extraction_schedules` table repository — at most one row per tenant.
//!
//! ```sql
//! CREATE TABLE extraction_schedules (
//!     tenant_id TEXT PRIMARY KEY REFERENCES tenants(id),
//!     kind TEXT NOT NULL,
//!     expression TEXT NOT NULL,
//!     is_active BOOLEAN NOT NULL DEFAULT TRUE
//! );
//! ```

use conectasei_types::domain::{ExtractionSchedule, ScheduleKind};
use conectasei_types::error::ConectaError;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;

fn kind_to_str(kind: ScheduleKind) -> &'static str {
    match kind {
        ScheduleKind::Interval => "interval",
        ScheduleKind::Cron => "cron",
    }
}

fn kind_from_str(value: &str) -> ScheduleKind {
    match value {
        "cron" => ScheduleKind::Cron,
        _ => ScheduleKind::Interval,
    }
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    tenant_id: String,
    kind: String,
    expression: String,
    is_active: bool,
}

impl From<ScheduleRow> for ExtractionSchedule {
    fn from(row: ScheduleRow) -> Self {
        ExtractionSchedule {
            tenant_id: row.tenant_id,
            kind: kind_from_str(&row.kind),
            expression: row.expression,
            is_active: row.is_active,
        }
    }
}

pub struct ScheduleRepository {
    pool: Arc<PgPool>,
}

impl ScheduleRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Loaded once at scheduler startup, then kept in sync by live
    /// mutation calls rather than re-polled.
    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<ExtractionSchedule>, ConectaError> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            "SELECT * FROM extraction_schedules WHERE is_active = TRUE ORDER BY tenant_id",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("list active schedules: {err}")))?;
        Ok(rows.into_iter().map(ExtractionSchedule::from).collect())
    }

    #[instrument(skip(self, schedule))]
    pub async fn upsert(&self, schedule: &ExtractionSchedule) -> Result<(), ConectaError> {
        sqlx::query(
            r#"
            INSERT INTO extraction_schedules (tenant_id, kind, expression, is_active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id) DO UPDATE SET
                kind = EXCLUDED.kind,
                expression = EXCLUDED.expression,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(&schedule.tenant_id)
        .bind(kind_to_str(schedule.kind))
        .bind(&schedule.expression)
        .bind(schedule.is_active)
        .execute(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("upsert schedule: {err}")))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn deactivate(&self, tenant_id: &str) -> Result<(), ConectaError> {
        sqlx::query("UPDATE extraction_schedules SET is_active = FALSE WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&*self.pool)
            .await
            .map_err(|err| ConectaError::Persistence(format!("deactivate schedule: {err}")))?;
        Ok(())
    }
}
