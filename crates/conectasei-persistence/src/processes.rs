//! `processes` table repository. `links` and `documents` are stored as
//! JSONB maps keyed by link URL / document number respectively, mirroring
//! the in-memory `HashMap` fields on [`Process`] directly rather than
//! normalizing them into child tables — the access pattern is always
//! "load one process whole, mutate its maps, write it back whole".
//!
//! ```sql
//! CREATE TABLE processes (
//!     id UUID PRIMARY KEY,
//!     tenant_id TEXT NOT NULL REFERENCES tenants(id),
//!     process_number TEXT NOT NULL,
//!     links JSONB NOT NULL DEFAULT '{}',
//!     documents JSONB NOT NULL DEFAULT '{}',
//!     access_type TEXT NOT NULL,
//!     best_current_link TEXT,
//!     category TEXT,
//!     category_status TEXT NOT NULL,
//!     authority TEXT NOT NULL DEFAULT '',
//!     nickname TEXT,
//!     no_valid_links BOOLEAN NOT NULL DEFAULT FALSE,
//!     last_updated TIMESTAMPTZ NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     UNIQUE (tenant_id, process_number)
//! );
//! ```

use chrono::{DateTime, Utc};
use conectasei_types::domain::{AccessType, CategoryStatus, DocumentRecord, LinkRecord, Process};
use conectasei_types::error::ConectaError;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct ProcessRow {
    id: Uuid,
    tenant_id: String,
    process_number: String,
    links: serde_json::Value,
    documents: serde_json::Value,
    access_type: String,
    best_current_link: Option<String>,
    category: Option<String>,
    category_status: String,
    authority: String,
    nickname: Option<String>,
    no_valid_links: bool,
    last_updated: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub(crate) fn access_type_to_str(access_type: AccessType) -> &'static str {
    match access_type {
        AccessType::Integral => "integral",
        AccessType::Partial => "partial",
        AccessType::Error => "error",
    }
}

fn access_type_from_str(value: &str) -> AccessType {
    match value {
        "integral" => AccessType::Integral,
        "partial" => AccessType::Partial,
        _ => AccessType::Error,
    }
}

pub(crate) fn category_status_to_str(status: CategoryStatus) -> &'static str {
    match status {
        CategoryStatus::Pending => "pending",
        CategoryStatus::Categorized => "categorized",
    }
}

fn category_status_from_str(value: &str) -> CategoryStatus {
    match value {
        "categorized" => CategoryStatus::Categorized,
        _ => CategoryStatus::Pending,
    }
}

impl TryFrom<ProcessRow> for Process {
    type Error = ConectaError;

    fn try_from(row: ProcessRow) -> Result<Self, Self::Error> {
        let links: HashMap<String, LinkRecord> = serde_json::from_value(row.links)
            .map_err(|err| ConectaError::Persistence(format!("decode process links: {err}")))?;
        let documents: HashMap<String, DocumentRecord> = serde_json::from_value(row.documents)
            .map_err(|err| ConectaError::Persistence(format!("decode process documents: {err}")))?;
        Ok(Process {
            id: row.id,
            tenant_id: row.tenant_id,
            process_number: row.process_number,
            links,
            documents,
            access_type: access_type_from_str(&row.access_type),
            best_current_link: row.best_current_link,
            category: row.category,
            category_status: category_status_from_str(&row.category_status),
            authority: row.authority,
            nickname: row.nickname,
            no_valid_links: row.no_valid_links,
            last_updated: row.last_updated,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct ProcessRepository {
    pool: Arc<PgPool>,
}

impl ProcessRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn find_by_number(
        &self,
        tenant_id: &str,
        process_number: &str,
    ) -> Result<Option<Process>, ConectaError> {
        let row = sqlx::query_as::<_, ProcessRow>(
            "SELECT * FROM processes WHERE tenant_id = $1 AND process_number = $2",
        )
        .bind(tenant_id)
        .bind(process_number)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("find process by number: {err}")))?;
        row.map(Process::try_from).transpose()
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, process_id: Uuid) -> Result<Option<Process>, ConectaError> {
        let row = sqlx::query_as::<_, ProcessRow>("SELECT * FROM processes WHERE id = $1")
            .bind(process_id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|err| ConectaError::Persistence(format!("find process by id: {err}")))?;
        row.map(Process::try_from).transpose()
    }

    #[instrument(skip(self))]
    pub async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<Process>, ConectaError> {
        let rows = sqlx::query_as::<_, ProcessRow>(
            "SELECT * FROM processes WHERE tenant_id = $1 ORDER BY process_number",
        )
        .bind(tenant_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("list processes for tenant: {err}")))?;
        rows.into_iter().map(Process::try_from).collect()
    }

    #[instrument(skip(self))]
    pub async fn list_pending_categorization(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<Process>, ConectaError> {
        let rows = sqlx::query_as::<_, ProcessRow>(
            "SELECT * FROM processes WHERE tenant_id = $1 AND category_status = 'pending' ORDER BY process_number",
        )
        .bind(tenant_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("list pending categorization: {err}")))?;
        rows.into_iter().map(Process::try_from).collect()
    }

    /// Insert-or-replace a single process. The extractor calls this once
    /// per discovered process inside its own transaction boundary, so no
    /// transaction is opened here.
    #[instrument(skip(self, process))]
    pub async fn upsert(&self, process: &Process) -> Result<(), ConectaError> {
        debug!(process_number = %process.process_number, "upserting process");
        let links = serde_json::to_value(&process.links)
            .map_err(|err| ConectaError::Persistence(format!("encode process links: {err}")))?;
        let documents = serde_json::to_value(&process.documents)
            .map_err(|err| ConectaError::Persistence(format!("encode process documents: {err}")))?;

        sqlx::query(
            r#"
            INSERT INTO processes (
                id, tenant_id, process_number, links, documents, access_type,
                best_current_link, category, category_status, authority, nickname,
                no_valid_links, last_updated, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (tenant_id, process_number) DO UPDATE SET
                links = EXCLUDED.links,
                documents = EXCLUDED.documents,
                access_type = EXCLUDED.access_type,
                best_current_link = EXCLUDED.best_current_link,
                category = EXCLUDED.category,
                category_status = EXCLUDED.category_status,
                authority = EXCLUDED.authority,
                nickname = EXCLUDED.nickname,
                no_valid_links = EXCLUDED.no_valid_links,
                last_updated = EXCLUDED.last_updated,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(process.id)
        .bind(&process.tenant_id)
        .bind(&process.process_number)
        .bind(links)
        .bind(documents)
        .bind(access_type_to_str(process.access_type))
        .bind(&process.best_current_link)
        .bind(&process.category)
        .bind(category_status_to_str(process.category_status))
        .bind(&process.authority)
        .bind(&process.nickname)
        .bind(process.no_valid_links)
        .bind(process.last_updated)
        .bind(process.created_at)
        .bind(process.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("upsert process: {err}")))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_category(
        &self,
        process_id: Uuid,
        category: &str,
    ) -> Result<(), ConectaError> {
        sqlx::query(
            "UPDATE processes SET category = $2, category_status = 'categorized', updated_at = NOW() WHERE id = $1",
        )
        .bind(process_id)
        .bind(category)
        .execute(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("set process category: {err}")))?;
        Ok(())
    }
}
