//! `document_history` table repository — append-only audit trail for every
//! download attempt.
//!
//! ```sql
//! CREATE TABLE document_history (
//!     id UUID PRIMARY KEY,
//!     process_id UUID NOT NULL REFERENCES processes(id),
//!     document_number TEXT NOT NULL,
//!     action TEXT NOT NULL,
//!     new_status TEXT NOT NULL,
//!     timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     details JSONB NOT NULL DEFAULT '{}'
//! );
//! CREATE INDEX idx_document_history_process ON document_history(process_id, document_number);
//! ```

use chrono::{DateTime, Utc};
use conectasei_types::domain::{DocumentHistory, DocumentStatus};
use conectasei_types::error::ConectaError;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

pub(crate) fn document_status_to_str(status: DocumentStatus) -> &'static str {
    match status {
        DocumentStatus::NotDownloaded => "not_downloaded",
        DocumentStatus::Downloaded => "downloaded",
        DocumentStatus::Error => "error",
        DocumentStatus::Partial => "partial",
    }
}

fn document_status_from_str(value: &str) -> DocumentStatus {
    match value {
        "downloaded" => DocumentStatus::Downloaded,
        "error" => DocumentStatus::Error,
        "partial" => DocumentStatus::Partial,
        _ => DocumentStatus::NotDownloaded,
    }
}

#[derive(sqlx::FromRow)]
struct DocumentHistoryRow {
    id: Uuid,
    process_id: Uuid,
    document_number: String,
    action: String,
    new_status: String,
    timestamp: DateTime<Utc>,
    details: serde_json::Value,
}

impl From<DocumentHistoryRow> for DocumentHistory {
    fn from(row: DocumentHistoryRow) -> Self {
        DocumentHistory {
            id: row.id,
            process_id: row.process_id,
            document_number: row.document_number,
            action: row.action,
            new_status: document_status_from_str(&row.new_status),
            timestamp: row.timestamp,
            details: row.details,
        }
    }
}

pub struct DocumentHistoryRepository {
    pool: Arc<PgPool>,
}

impl DocumentHistoryRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, entry))]
    pub async fn append(&self, entry: &DocumentHistory) -> Result<(), ConectaError> {
        sqlx::query(
            r#"
            INSERT INTO document_history (id, process_id, document_number, action, new_status, timestamp, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(entry.process_id)
        .bind(&entry.document_number)
        .bind(&entry.action)
        .bind(document_status_to_str(entry.new_status))
        .bind(entry.timestamp)
        .bind(&entry.details)
        .execute(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("append document history: {err}")))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_for_document(
        &self,
        process_id: Uuid,
        document_number: &str,
    ) -> Result<Vec<DocumentHistory>, ConectaError> {
        let rows = sqlx::query_as::<_, DocumentHistoryRow>(
            "SELECT * FROM document_history WHERE process_id = $1 AND document_number = $2 ORDER BY timestamp",
        )
        .bind(process_id)
        .bind(document_number)
        .fetch_all(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("list document history: {err}")))?;
        Ok(rows.into_iter().map(DocumentHistory::from).collect())
    }
}
