//! Document Downloader: for one process (and an optional document
//! subset), fetches each not-yet-downloaded document, normalizes it to
//! PDF, uploads it to the object store, and records history. A single
//! document's failure never aborts the task; an unreachable browser
//! context does.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use conectasei_browser::BrowserPool;
use conectasei_objectstore::ObjectStoreClient;
use conectasei_persistence::{DownloadTaskRepository, ProcessRepository, TenantRepository};
use conectasei_scrapers::ScraperRegistry;
use conectasei_tasks::TaskControlPlane;
use conectasei_types::config::PipelineConfig;
use conectasei_types::domain::{
    DocumentHistory, DocumentStatus, DownloadOutcome, DownloadTask, Process, RequestedDocuments,
    TaskStatus,
};
use conectasei_types::error::ConectaError;
use conectasei_types::secrets::SecretString;
use conectasei_utils::CancellationToken;
use conectasei_vault::CredentialVault;
use sqlx::PgPool;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::selection::resolve_targets;

pub struct DownloaderDeps {
    pub pool: PgPool,
    pub processes: Arc<ProcessRepository>,
    pub tenants: Arc<TenantRepository>,
    pub tasks: Arc<DownloadTaskRepository>,
    pub registry: Arc<ScraperRegistry>,
    pub browser_pool: Arc<BrowserPool>,
    pub vault: Arc<CredentialVault>,
    pub object_store: Arc<ObjectStoreClient>,
    pub task_control_plane: Arc<TaskControlPlane>,
    pub config: PipelineConfig,
}

pub struct Downloader {
    deps: DownloaderDeps,
}

impl Downloader {
    pub fn new(deps: DownloaderDeps) -> Self {
        Self { deps }
    }

    /// Run a download task for `process_id` against `requested_documents`,
    /// not returning until it reaches a terminal state. A document-level
    /// failure is folded into `results` rather than propagated.
    #[instrument(skip(self, cancel), fields(process_id = %process_id))]
    pub async fn run(
        &self,
        process_id: Uuid,
        requested_documents: RequestedDocuments,
        cancel: CancellationToken,
    ) -> Result<DownloadTask, ConectaError> {
        let task = DownloadTask::pending(process_id, requested_documents);
        self.deps.tasks.insert(&task).await?;
        self.deps.task_control_plane.track_download(task.clone());
        Ok(self.drive_to_completion(task, cancel).await)
    }

    /// Insert the task and return its id immediately, continuing the run
    /// in a detached task — the task-id-immediately contract the external
    /// interface requires of a background operation.
    pub async fn start(
        self: Arc<Self>,
        process_id: Uuid,
        requested_documents: RequestedDocuments,
        cancel: CancellationToken,
    ) -> Result<DownloadTask, ConectaError> {
        let task = DownloadTask::pending(process_id, requested_documents);
        self.deps.tasks.insert(&task).await?;
        self.deps.task_control_plane.track_download(task.clone());
        let returned = task.clone();
        tokio::spawn(async move {
            self.drive_to_completion(task, cancel).await;
        });
        Ok(returned)
    }

    async fn drive_to_completion(&self, mut task: DownloadTask, cancel: CancellationToken) -> DownloadTask {
        let result = tokio::time::timeout(
            self.deps.config.download_task_timeout,
            self.run_inner(&mut task, &cancel),
        )
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if err.is_run_fatal() {
                    error!(error = %err, "download task failed fatally");
                } else {
                    warn!(error = %err, "download task failed");
                }
                task.status = TaskStatus::Failed;
                task.finished_at = Some(Utc::now());
            }
            Err(_) => {
                error!("download task exceeded its timeout");
                task.status = TaskStatus::Failed;
                task.finished_at = Some(Utc::now());
            }
        }
        if let Err(err) = self.deps.tasks.update(&task).await {
            warn!(error = %err, "failed to persist final download task state");
        }
        self.deps.task_control_plane.untrack(task.id);
        task
    }

    async fn run_inner(
        &self,
        task: &mut DownloadTask,
        cancel: &CancellationToken,
    ) -> Result<(), ConectaError> {
        task.status = TaskStatus::Running;
        task.started_at = Some(Utc::now());
        self.deps.tasks.update(task).await?;

        let mut process = self
            .deps
            .processes
            .find_by_id(task.process_id)
            .await?
            .ok_or_else(|| ConectaError::Config(format!("unknown process {}", task.process_id)))?;

        let best_link = process.best_current_link.clone().ok_or_else(|| {
            ConectaError::Config(format!(
                "process {} has no valid link to download from",
                process.process_number
            ))
        })?;

        let tenant = self
            .deps
            .tenants
            .find_by_id(&process.tenant_id)
            .await?
            .ok_or_else(|| ConectaError::Config(format!("unknown tenant {}", process.tenant_id)))?;

        let plugin = self.deps.registry.get(&tenant.scraper_version).ok_or_else(|| {
            ConectaError::Config(format!(
                "no scraper plugin registered for version {}",
                tenant.scraper_version
            ))
        })?;

        let credentials = self
            .deps
            .vault
            .decrypt_credentials(&tenant.encrypted_credentials)
            .map_err(|err| ConectaError::Config(format!("failed to decrypt credentials: {err}")))?;
        let email = expose(&credentials.email);
        let password = expose(&credentials.password);

        let targets = resolve_targets(&task.requested_documents, &process.documents);

        let login_plugin = plugin.clone();
        let login_email = email.clone();
        let login_password = password.clone();
        let session = self
            .deps
            .browser_pool
            .acquire(&tenant.upstream_url, cancel, move |page| async move {
                login_plugin.login(&page, &login_email, &login_password).await?;
                Ok(page)
            })
            .await
            .map_err(|err| ConectaError::Auth {
                tenant_id: tenant.id.clone(),
                reason: err.to_string(),
            })?;

        plugin
            .open_process(session.page(), &best_link, self.deps.browser_pool.nav_timeout(), cancel)
            .await?;

        let mut history = Vec::new();
        let mut results = HashMap::new();

        for document_number in targets {
            if cancel.is_cancelled() {
                break;
            }
            let _ = session.dismiss_dialogs().await;

            let download_started = Utc::now();
            let scratch_dir = tempfile::tempdir().map_err(ConectaError::Io)?;
            let download_result = plugin
                .download_document(session.page(), &document_number, scratch_dir.path())
                .await;
            let download_finished = Utc::now();

            let downloaded_file = match download_result {
                Ok(file) => file,
                Err(err) => {
                    warn!(document_number = %document_number, error = %err, "document download failed");
                    record_failure(
                        &mut process,
                        &mut history,
                        &mut results,
                        &document_number,
                        download_started,
                        &err.to_string(),
                    );
                    continue;
                }
            };

            let extension = downloaded_file
                .path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("")
                .to_string();
            let payload = if conectasei_pdf::is_html_payload(&extension) {
                match conectasei_pdf::render_page_to_pdf(session.page()).await {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        record_failure(
                            &mut process,
                            &mut history,
                            &mut results,
                            &document_number,
                            download_started,
                            &format!("html-to-pdf conversion failed: {err}"),
                        );
                        continue;
                    }
                }
            } else {
                match tokio::fs::read(&downloaded_file.path).await {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        record_failure(
                            &mut process,
                            &mut history,
                            &mut results,
                            &document_number,
                            download_started,
                            &format!("failed to read downloaded file: {err}"),
                        );
                        continue;
                    }
                }
            };

            let path =
                conectasei_objectstore::canonical_path(&tenant.id, &process.process_number, &document_number);
            let upload_started = Utc::now();
            let uploaded = self.deps.object_store.upload(&path, payload).await;
            let upload_finished = Utc::now();

            let total_duration_ms = (upload_finished - download_started).num_milliseconds().max(0) as u64;
            let status = if uploaded {
                DocumentStatus::Downloaded
            } else {
                DocumentStatus::Partial
            };

            if let Some(record) = process.documents.get_mut(&document_number) {
                record.status = status;
                record.last_checked = upload_finished;
            }

            history.push(DocumentHistory {
                id: Uuid::new_v4(),
                process_id: process.id,
                document_number: document_number.clone(),
                action: "download".to_string(),
                new_status: status,
                timestamp: upload_finished,
                details: serde_json::json!({
                    "download_started": download_started,
                    "download_finished": download_finished,
                    "upload_started": upload_started,
                    "upload_finished": upload_finished,
                    "total_duration_ms": total_duration_ms,
                }),
            });
            results.insert(
                document_number,
                DownloadOutcome {
                    uploaded,
                    reason: if uploaded {
                        None
                    } else {
                        Some("object store upload failed".to_string())
                    },
                },
            );
        }

        self.deps.browser_pool.release(session).await;
        process.updated_at = Utc::now();
        conectasei_persistence::transaction::upsert_process_with_history(&self.deps.pool, &process, &history)
            .await?;

        task.results = results;
        task.status = TaskStatus::Completed;
        task.finished_at = Some(Utc::now());
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn record_failure(
    process: &mut Process,
    history: &mut Vec<DocumentHistory>,
    results: &mut HashMap<String, DownloadOutcome>,
    document_number: &str,
    download_started: DateTime<Utc>,
    reason: &str,
) {
    let now = Utc::now();
    if let Some(record) = process.documents.get_mut(document_number) {
        record.status = DocumentStatus::Error;
        record.last_checked = now;
    }
    history.push(DocumentHistory {
        id: Uuid::new_v4(),
        process_id: process.id,
        document_number: document_number.to_string(),
        action: "download".to_string(),
        new_status: DocumentStatus::Error,
        timestamp: now,
        details: serde_json::json!({
            "download_started": download_started,
            "download_finished": now,
            "error": reason,
        }),
    });
    results.insert(
        document_number.to_string(),
        DownloadOutcome {
            uploaded: false,
            reason: Some(reason.to_string()),
        },
    );
}

fn expose(secret: &SecretString) -> String {
    secret.expose_secret().to_string()
}
