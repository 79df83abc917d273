//! Transactional composition for a downloader write: the process row
//! (with its updated `documents[doc].status`) and the document-history
//! rows a download attempt produced commit together or not at all, so a
//! crash mid-write never leaves a process updated without the audit
//! trail that explains why.

use conectasei_types::domain::{DocumentHistory, Process};
use conectasei_types::error::ConectaError;
use sqlx::PgPool;

use crate::document_history::document_status_to_str;
use crate::processes::{access_type_to_str, category_status_to_str};

#[tracing::instrument(skip(pool, process, history))]
pub async fn upsert_process_with_history(
    pool: &PgPool,
    process: &Process,
    history: &[DocumentHistory],
) -> Result<(), ConectaError> {
    let links = serde_json::to_value(&process.links)
        .map_err(|err| ConectaError::Persistence(format!("encode process links: {err}")))?;
    let documents = serde_json::to_value(&process.documents)
        .map_err(|err| ConectaError::Persistence(format!("encode process documents: {err}")))?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|err| ConectaError::Persistence(format!("begin transaction: {err}")))?;

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
    .execute(&mut *tx)
    .await
    .map_err(|err| ConectaError::Persistence(format!("upsert process in transaction: {err}")))?;

    for entry in history {
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
        .execute(&mut *tx)
        .await
        .map_err(|err| ConectaError::Persistence(format!("append document history in transaction: {err}")))?;
    }

    tx.commit()
        .await
        .map_err(|err| ConectaError::Persistence(format!("commit transaction: {err}")))?;
    Ok(())
}
