//! `download_tasks` table repository — one row per document-download run.
//!
//! ```sql
//! CREATE TABLE download_tasks (
//!     id UUID PRIMARY KEY,
//!     process_id UUID NOT NULL REFERENCES processes(id),
//!     status TEXT NOT NULL,
//!     requested_documents JSONB NOT NULL,
//!     results JSONB NOT NULL DEFAULT '{}',
//!     started_at TIMESTAMPTZ,
//!     finished_at TIMESTAMPTZ
//! );
//! ```

use chrono::{DateTime, Utc};
use conectasei_types::domain::{DownloadOutcome, DownloadTask, RequestedDocuments};
use conectasei_types::error::ConectaError;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::status::{task_status_from_str, task_status_to_str};

#[derive(sqlx::FromRow)]
struct DownloadTaskRow {
    id: Uuid,
    process_id: Uuid,
    status: String,
    requested_documents: serde_json::Value,
    results: serde_json::Value,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<DownloadTaskRow> for DownloadTask {
    type Error = ConectaError;

    fn try_from(row: DownloadTaskRow) -> Result<Self, Self::Error> {
        let requested_documents: RequestedDocuments = serde_json::from_value(row.requested_documents)
            .map_err(|err| ConectaError::Persistence(format!("decode requested documents: {err}")))?;
        let results: HashMap<String, DownloadOutcome> = serde_json::from_value(row.results)
            .map_err(|err| ConectaError::Persistence(format!("decode download results: {err}")))?;
        Ok(DownloadTask {
            id: row.id,
            process_id: row.process_id,
            status: task_status_from_str(&row.status),
            requested_documents,
            results,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

pub struct DownloadTaskRepository {
    pool: Arc<PgPool>,
}

impl DownloadTaskRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, task_id: Uuid) -> Result<Option<DownloadTask>, ConectaError> {
        let row = sqlx::query_as::<_, DownloadTaskRow>(
            "SELECT * FROM download_tasks WHERE id = $1",
        )
        .bind(task_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("find download task: {err}")))?;
        row.map(DownloadTask::try_from).transpose()
    }

    #[instrument(skip(self))]
    pub async fn list_unfinished(&self) -> Result<Vec<DownloadTask>, ConectaError> {
        let rows = sqlx::query_as::<_, DownloadTaskRow>(
            "SELECT * FROM download_tasks WHERE status IN ('pending', 'running')",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("list unfinished download tasks: {err}")))?;
        rows.into_iter().map(DownloadTask::try_from).collect()
    }

    #[instrument(skip(self, task))]
    pub async fn insert(&self, task: &DownloadTask) -> Result<(), ConectaError> {
        let requested_documents = serde_json::to_value(&task.requested_documents)
            .map_err(|err| ConectaError::Persistence(format!("encode requested documents: {err}")))?;
        let results = serde_json::to_value(&task.results)
            .map_err(|err| ConectaError::Persistence(format!("encode download results: {err}")))?;
        sqlx::query(
            r#"
            INSERT INTO download_tasks (id, process_id, status, requested_documents, results, started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(task.id)
        .bind(task.process_id)
        .bind(task_status_to_str(task.status))
        .bind(requested_documents)
        .bind(results)
        .bind(task.started_at)
        .bind(task.finished_at)
        .execute(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("insert download task: {err}")))?;
        Ok(())
    }

    #[instrument(skip(self, task))]
    pub async fn update(&self, task: &DownloadTask) -> Result<(), ConectaError> {
        let results = serde_json::to_value(&task.results)
            .map_err(|err| ConectaError::Persistence(format!("encode download results: {err}")))?;
        sqlx::query(
            r#"
            UPDATE download_tasks SET
                status = $2,
                results = $3,
                started_at = $4,
                finished_at = $5
            WHERE id = $1
            "#,
        )
        .bind(task.id)
        .bind(task_status_to_str(task.status))
        .bind(results)
        .bind(task.started_at)
        .bind(task.finished_at)
        .execute(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("update download task: {err}")))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn mark_orphaned(&self, task_id: Uuid) -> Result<(), ConectaError> {
        sqlx::query(
            "UPDATE download_tasks SET status = 'failed', finished_at = NOW() WHERE id = $1",
        )
        .bind(task_id)
        .execute(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("mark download task orphaned: {err}")))?;
        Ok(())
    }
}
