//! Durable domain model shared by the repositories, extractor, downloader,
//! scheduler and task control plane. Mirrors the schema in the external
//! relational store 1:1 — these structs are what repositories hydrate rows
//! into and what the pipeline mutates in memory before upserting.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One administrative boundary: its own upstream URL, credentials and
/// process corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub upstream_url: String,
    pub scraper_version: String,
    pub is_active: bool,
    /// Ciphertext only. Decrypted on demand by the Credential Vault inside
    /// the worker process and never logged.
    #[serde(skip_serializing)]
    pub encrypted_credentials: Vec<u8>,
    pub extra_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `integral` (full view, documents extractable) or `partial` (restricted;
/// documents extractable only for the `restricted` category), or `error`
/// when the link itself could not be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Integral,
    Partial,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    Pending,
    Categorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkHistoryEntry {
    pub checked_at: DateTime<Utc>,
    pub status: LinkStatus,
    pub access_type: AccessType,
}

/// One of possibly several upstream URLs granting some access to a process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    pub status: LinkStatus,
    pub access_type: AccessType,
    pub last_checked: DateTime<Utc>,
    pub history: Vec<LinkHistoryEntry>,
}

impl LinkRecord {
    pub fn record_check(&mut self, status: LinkStatus, access_type: AccessType, at: DateTime<Utc>) {
        self.status = status;
        self.access_type = access_type;
        self.last_checked = at;
        self.history.push(LinkHistoryEntry {
            checked_at: at,
            status,
            access_type,
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    NotDownloaded,
    Downloaded,
    Error,
    Partial,
}

/// An attachment within a process, identified by an 8-digit number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(rename = "type")]
    pub doc_type: String,
    /// `dd/mm/yyyy`, kept as the upstream formats it rather than parsed.
    pub date: String,
    pub status: DocumentStatus,
    pub last_checked: DateTime<Utc>,
    pub signer: Option<String>,
}

/// A unit of record in the upstream system, identified by a
/// `NNNNN.NNNNNN/YYYY-DD` number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pub id: Uuid,
    pub tenant_id: String,
    pub process_number: String,
    pub links: HashMap<String, LinkRecord>,
    pub documents: HashMap<String, DocumentRecord>,
    pub access_type: AccessType,
    pub best_current_link: Option<String>,
    pub category: Option<String>,
    pub category_status: CategoryStatus,
    /// Stored under the canonical `authority` column; the legacy
    /// `Authority` capitalization is accepted only at the API boundary, not
    /// here.
    pub authority: String,
    pub nickname: Option<String>,
    pub no_valid_links: bool,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Process {
    pub fn new(tenant_id: impl Into<String>, process_number: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            process_number: process_number.into(),
            links: HashMap::new(),
            documents: HashMap::new(),
            access_type: AccessType::Error,
            best_current_link: None,
            category: None,
            category_status: CategoryStatus::Pending,
            authority: String::new(),
            nickname: None,
            no_valid_links: false,
            last_updated: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// True once every known link has been marked inactive.
    pub fn all_links_inactive(&self) -> bool {
        !self.links.is_empty() && self.links.values().all(|l| l.status == LinkStatus::Inactive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub discovered: u32,
    pub new_processes: u32,
    pub updated_processes: u32,
    pub new_documents: u32,
    pub failures: u32,
}

/// One durable record of an extraction invocation for a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionTask {
    pub id: Uuid,
    pub tenant_id: String,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub progress: u8,
    pub result_summary: ExtractionSummary,
    pub error_message: Option<String>,
}

impl ExtractionTask {
    pub fn pending(tenant_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            status: TaskStatus::Pending,
            started_at: None,
            finished_at: None,
            progress: 0,
            result_summary: ExtractionSummary::default(),
            error_message: None,
        }
    }
}

/// A document-number selection for a download task: either every
/// candidate document or an explicit subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "documents")]
pub enum RequestedDocuments {
    All,
    Subset(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub uploaded: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: Uuid,
    pub process_id: Uuid,
    pub status: TaskStatus,
    pub requested_documents: RequestedDocuments,
    pub results: HashMap<String, DownloadOutcome>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DownloadTask {
    pub fn pending(process_id: Uuid, requested_documents: RequestedDocuments) -> Self {
        Self {
            id: Uuid::new_v4(),
            process_id,
            status: TaskStatus::Pending,
            requested_documents,
            results: HashMap::new(),
            started_at: None,
            finished_at: None,
        }
    }
}

/// Append-only audit row for one download attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentHistory {
    pub id: Uuid,
    pub process_id: Uuid,
    pub document_number: String,
    pub action: String,
    pub new_status: DocumentStatus,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Interval,
    Cron,
}

/// Exactly zero-or-one per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSchedule {
    pub tenant_id: String,
    pub kind: ScheduleKind,
    pub expression: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}
