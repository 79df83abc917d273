//! `extraction_tasks` table repository — one row per extraction run.
//!
//! ```sql
//! CREATE TABLE extraction_tasks (
//!     id UUID PRIMARY KEY,
//!     tenant_id TEXT NOT NULL REFERENCES tenants(id),
//!     status TEXT NOT NULL,
//!     started_at TIMESTAMPTZ,
//!     finished_at TIMESTAMPTZ,
//!     progress SMALLINT NOT NULL DEFAULT 0,
//!     result_summary JSONB NOT NULL DEFAULT '{}',
//!     error_message TEXT
//! );
//! ```

use chrono::{DateTime, Utc};
use conectasei_types::domain::{ExtractionSummary, ExtractionTask, TaskStatus};
use conectasei_types::error::ConectaError;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::status::{task_status_from_str, task_status_to_str};

#[derive(sqlx::FromRow)]
struct ExtractionTaskRow {
    id: Uuid,
    tenant_id: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    progress: i16,
    result_summary: serde_json::Value,
    error_message: Option<String>,
}

impl TryFrom<ExtractionTaskRow> for ExtractionTask {
    type Error = ConectaError;

    fn try_from(row: ExtractionTaskRow) -> Result<Self, Self::Error> {
        let result_summary: ExtractionSummary = serde_json::from_value(row.result_summary)
            .map_err(|err| ConectaError::Persistence(format!("decode extraction summary: {err}")))?;
        Ok(ExtractionTask {
            id: row.id,
            tenant_id: row.tenant_id,
            status: task_status_from_str(&row.status),
            started_at: row.started_at,
            finished_at: row.finished_at,
            progress: row.progress.clamp(0, u8::MAX as i16) as u8,
            result_summary,
            error_message: row.error_message,
        })
    }
}

/// Result of [`ExtractionTaskRepository::try_admit`]: either the task was
/// freshly inserted, or the tenant already had one running and the caller
/// should coalesce onto it.
#[derive(Debug, Clone)]
pub enum AdmissionOutcome {
    Admitted(ExtractionTask),
    Coalesced(ExtractionTask),
}

pub struct ExtractionTaskRepository {
    pool: Arc<PgPool>,
}

impl ExtractionTaskRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, task_id: Uuid) -> Result<Option<ExtractionTask>, ConectaError> {
        let row = sqlx::query_as::<_, ExtractionTaskRow>(
            "SELECT * FROM extraction_tasks WHERE id = $1",
        )
        .bind(task_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("find extraction task: {err}")))?;
        row.map(ExtractionTask::try_from).transpose()
    }

    /// Tasks still `pending` or `running` when the process last stopped —
    /// the task control plane marks these `failed` with an orphan reason
    /// on startup.
    #[instrument(skip(self))]
    pub async fn list_unfinished(&self) -> Result<Vec<ExtractionTask>, ConectaError> {
        let rows = sqlx::query_as::<_, ExtractionTaskRow>(
            "SELECT * FROM extraction_tasks WHERE status IN ('pending', 'running')",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("list unfinished extraction tasks: {err}")))?;
        rows.into_iter().map(ExtractionTask::try_from).collect()
    }

    #[instrument(skip(self))]
    pub async fn has_active_for_tenant(&self, tenant_id: &str) -> Result<bool, ConectaError> {
        Ok(self.find_active_for_tenant(tenant_id).await?.is_some())
    }

    /// The tenant's current `pending`/`running` task, if any — used to
    /// coalesce a new extraction request onto an in-flight one instead of
    /// starting a second run for the same tenant.
    #[instrument(skip(self))]
    pub async fn find_active_for_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<Option<ExtractionTask>, ConectaError> {
        let row = sqlx::query_as::<_, ExtractionTaskRow>(
            "SELECT * FROM extraction_tasks WHERE tenant_id = $1 AND status IN ('pending', 'running') ORDER BY started_at DESC LIMIT 1",
        )
        .bind(tenant_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("find active extraction task: {err}")))?;
        row.map(ExtractionTask::try_from).transpose()
    }

    /// Atomically admit `task` as the tenant's new run, or hand back the
    /// tenant's already-active one. Holds `pg_advisory_xact_lock` on a hash
    /// of the tenant id for the duration of one transaction so the
    /// check-and-insert can never race with a concurrent caller for the
    /// same tenant — unlike `find_active_for_tenant` followed by `insert`,
    /// which two simultaneous callers could both pass.
    #[instrument(skip(self, task))]
    pub async fn try_admit(
        &self,
        tenant_id: &str,
        task: &ExtractionTask,
    ) -> Result<AdmissionOutcome, ConectaError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| ConectaError::Persistence(format!("begin admission transaction: {err}")))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(tenant_id)
            .execute(&mut *tx)
            .await
            .map_err(|err| ConectaError::Persistence(format!("acquire tenant admission lock: {err}")))?;

        let existing = sqlx::query_as::<_, ExtractionTaskRow>(
            "SELECT * FROM extraction_tasks WHERE tenant_id = $1 AND status IN ('pending', 'running') ORDER BY started_at DESC LIMIT 1",
        )
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| ConectaError::Persistence(format!("find active extraction task: {err}")))?;

        if let Some(row) = existing {
            let active = ExtractionTask::try_from(row)?;
            tx.commit()
                .await
                .map_err(|err| ConectaError::Persistence(format!("commit admission transaction: {err}")))?;
            return Ok(AdmissionOutcome::Coalesced(active));
        }

        let result_summary = serde_json::to_value(&task.result_summary)
            .map_err(|err| ConectaError::Persistence(format!("encode extraction summary: {err}")))?;
        sqlx::query(
            r#"
            INSERT INTO extraction_tasks (id, tenant_id, status, started_at, finished_at, progress, result_summary, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(task.id)
        .bind(&task.tenant_id)
        .bind(task_status_to_str(task.status))
        .bind(task.started_at)
        .bind(task.finished_at)
        .bind(task.progress as i16)
        .bind(result_summary)
        .bind(&task.error_message)
        .execute(&mut *tx)
        .await
        .map_err(|err| ConectaError::Persistence(format!("insert extraction task: {err}")))?;

        tx.commit()
            .await
            .map_err(|err| ConectaError::Persistence(format!("commit admission transaction: {err}")))?;
        Ok(AdmissionOutcome::Admitted(task.clone()))
    }

    #[instrument(skip(self, task))]
    pub async fn insert(&self, task: &ExtractionTask) -> Result<(), ConectaError> {
        let result_summary = serde_json::to_value(&task.result_summary)
            .map_err(|err| ConectaError::Persistence(format!("encode extraction summary: {err}")))?;
        sqlx::query(
            r#"
            INSERT INTO extraction_tasks (id, tenant_id, status, started_at, finished_at, progress, result_summary, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(task.id)
        .bind(&task.tenant_id)
        .bind(task_status_to_str(task.status))
        .bind(task.started_at)
        .bind(task.finished_at)
        .bind(task.progress as i16)
        .bind(result_summary)
        .bind(&task.error_message)
        .execute(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("insert extraction task: {err}")))?;
        Ok(())
    }

    #[instrument(skip(self, task))]
    pub async fn update(&self, task: &ExtractionTask) -> Result<(), ConectaError> {
        let result_summary = serde_json::to_value(&task.result_summary)
            .map_err(|err| ConectaError::Persistence(format!("encode extraction summary: {err}")))?;
        sqlx::query(
            r#"
            UPDATE extraction_tasks SET
                status = $2,
                started_at = $3,
                finished_at = $4,
                progress = $5,
                result_summary = $6,
                error_message = $7
            WHERE id = $1
            "#,
        )
        .bind(task.id)
        .bind(task_status_to_str(task.status))
        .bind(task.started_at)
        .bind(task.finished_at)
        .bind(task.progress as i16)
        .bind(result_summary)
        .bind(&task.error_message)
        .execute(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("update extraction task: {err}")))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn mark_orphaned(&self, task_id: Uuid) -> Result<(), ConectaError> {
        sqlx::query(
            "UPDATE extraction_tasks SET status = 'failed', finished_at = NOW(), error_message = 'orphaned: worker restarted mid-run' WHERE id = $1",
        )
        .bind(task_id)
        .execute(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("mark extraction task orphaned: {err}")))?;
        Ok(())
    }
}
