//! `tenants` table repository.
//!
//! ```sql
//! CREATE TABLE tenants (
//!     id TEXT PRIMARY KEY,
//!     name TEXT NOT NULL,
//!     upstream_url TEXT NOT NULL,
//!     scraper_version TEXT NOT NULL,
//!     is_active BOOLEAN NOT NULL DEFAULT TRUE,
//!     encrypted_credentials BYTEA NOT NULL,
//!     extra_metadata JSONB NOT NULL DEFAULT '{}',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use conectasei_types::domain::Tenant;
use conectasei_types::error::ConectaError;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(sqlx::FromRow)]
struct TenantRow {
    id: String,
    name: String,
    upstream_url: String,
    scraper_version: String,
    is_active: bool,
    encrypted_credentials: Vec<u8>,
    extra_metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            id: row.id,
            name: row.name,
            upstream_url: row.upstream_url,
            scraper_version: row.scraper_version,
            is_active: row.is_active,
            encrypted_credentials: row.encrypted_credentials,
            extra_metadata: row.extra_metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct TenantRepository {
    pool: Arc<PgPool>,
}

impl TenantRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, tenant_id: &str) -> Result<Option<Tenant>, ConectaError> {
        let row = sqlx::query_as::<_, TenantRow>("SELECT * FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|err| ConectaError::Persistence(format!("find tenant by id: {err}")))?;
        Ok(row.map(Tenant::from))
    }

    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<Tenant>, ConectaError> {
        let rows = sqlx::query_as::<_, TenantRow>(
            "SELECT * FROM tenants WHERE is_active = TRUE ORDER BY id",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("list active tenants: {err}")))?;
        Ok(rows.into_iter().map(Tenant::from).collect())
    }

    #[instrument(skip(self, tenant))]
    pub async fn upsert(&self, tenant: &Tenant) -> Result<(), ConectaError> {
        debug!(tenant_id = %tenant.id, "upserting tenant");
        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, upstream_url, scraper_version, is_active, encrypted_credentials, extra_metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                upstream_url = EXCLUDED.upstream_url,
                scraper_version = EXCLUDED.scraper_version,
                is_active = EXCLUDED.is_active,
                encrypted_credentials = EXCLUDED.encrypted_credentials,
                extra_metadata = EXCLUDED.extra_metadata,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.upstream_url)
        .bind(&tenant.scraper_version)
        .bind(tenant.is_active)
        .bind(&tenant.encrypted_credentials)
        .bind(&tenant.extra_metadata)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|err| ConectaError::Persistence(format!("upsert tenant: {err}")))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_active(&self, tenant_id: &str, is_active: bool) -> Result<(), ConectaError> {
        sqlx::query("UPDATE tenants SET is_active = $2, updated_at = NOW() WHERE id = $1")
            .bind(tenant_id)
            .bind(is_active)
            .execute(&*self.pool)
            .await
            .map_err(|err| ConectaError::Persistence(format!("set tenant active flag: {err}")))?;
        Ok(())
    }
}
