//! Process Extractor: discovery (Phase A) followed by bounded per-process
//! worker fan-out (Phase B), producing an updated [`ExtractionTask`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use conectasei_browser::BrowserPool;
use conectasei_persistence::{AdmissionOutcome, ExtractionTaskRepository, ProcessRepository, TenantRepository};
use conectasei_scrapers::{DiscoveredProcess, ScraperRegistry};
use conectasei_tasks::TaskControlPlane;
use conectasei_types::config::PipelineConfig;
use conectasei_types::domain::{ExtractionSummary, ExtractionTask, TaskStatus};
use conectasei_types::error::ConectaError;
use conectasei_types::ports::{NewDocumentNotice, NotificationDispatcher};
use conectasei_types::secrets::SecretString;
use conectasei_types::validation::validate_process_number;
use conectasei_utils::CancellationToken;
use conectasei_vault::CredentialVault;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};

use crate::worker::{process_one, ProcessOutcome};

pub struct ExtractorDeps {
    pub tenants: Arc<TenantRepository>,
    pub processes: Arc<ProcessRepository>,
    pub tasks: Arc<ExtractionTaskRepository>,
    pub registry: Arc<ScraperRegistry>,
    pub browser_pool: Arc<BrowserPool>,
    pub vault: Arc<CredentialVault>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub task_control_plane: Arc<TaskControlPlane>,
    pub config: PipelineConfig,
}

/// The outcome of [`Extractor::admit`]: either a fresh task to drive, or an
/// in-flight one this call coalesces onto.
enum Admission {
    Start(ExtractionTask),
    Coalesced(ExtractionTask),
}

pub struct Extractor {
    deps: ExtractorDeps,
}

impl Extractor {
    pub fn new(deps: ExtractorDeps) -> Self {
        Self { deps }
    }

    /// Run (or coalesce onto an in-flight run of) an extraction for one
    /// tenant, not returning until the run reaches a terminal state.
    /// Suited to a caller that is itself already running in the
    /// background, e.g. one scheduler job slot.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant_id))]
    pub async fn run_for_tenant(
        &self,
        tenant_id: &str,
        cancel: CancellationToken,
    ) -> Result<ExtractionTask, ConectaError> {
        match self.admit(tenant_id).await? {
            Admission::Start(task) => Ok(self.drive_to_completion(task, cancel).await),
            Admission::Coalesced(task) => Ok(task),
        }
    }

    /// Admit a new extraction run and return immediately with its task id,
    /// continuing the run in a detached task. The caller (an API handler)
    /// gets a task id right away, as the external interface requires; the
    /// task control plane is the thing that later tracks it to completion.
    pub async fn start_for_tenant(
        self: Arc<Self>,
        tenant_id: String,
        cancel: CancellationToken,
    ) -> Result<ExtractionTask, ConectaError> {
        match self.admit(&tenant_id).await? {
            Admission::Start(task) => {
                let returned = task.clone();
                tokio::spawn(async move {
                    self.drive_to_completion(task, cancel).await;
                });
                Ok(returned)
            }
            Admission::Coalesced(task) => Ok(task),
        }
    }

    /// Admit a task for `tenant_id`, or hand back the already-active one.
    /// The check-and-insert happens inside one transaction holding an
    /// advisory lock on the tenant id (see
    /// `ExtractionTaskRepository::try_admit`), so two concurrent callers
    /// for the same tenant can never both be admitted.
    async fn admit(&self, tenant_id: &str) -> Result<Admission, ConectaError> {
        let candidate = ExtractionTask::pending(tenant_id);
        match self.deps.tasks.try_admit(tenant_id, &candidate).await? {
            AdmissionOutcome::Admitted(task) => {
                self.deps.task_control_plane.track_extraction(task.clone());
                Ok(Admission::Start(task))
            }
            AdmissionOutcome::Coalesced(active) => {
                info!(task_id = %active.id, "coalescing onto in-flight extraction task");
                Ok(Admission::Coalesced(active))
            }
        }
    }

    async fn drive_to_completion(&self, mut task: ExtractionTask, cancel: CancellationToken) -> ExtractionTask {
        let tenant_id = task.tenant_id.clone();
        let result = tokio::time::timeout(
            self.deps.config.extraction_run_timeout,
            self.run_inner(&tenant_id, &mut task, &cancel),
        )
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if err.is_run_fatal() {
                    error!(error = %err, "extraction run failed fatally");
                } else {
                    warn!(error = %err, "extraction run failed");
                }
                task.status = TaskStatus::Failed;
                task.finished_at = Some(Utc::now());
                task.error_message = Some(err.to_string());
            }
            Err(_) => {
                error!("extraction run exceeded its timeout");
                task.status = TaskStatus::Failed;
                task.finished_at = Some(Utc::now());
                task.error_message = Some("extraction run exceeded its timeout".to_string());
            }
        }
        if let Err(err) = self.deps.tasks.update(&task).await {
            warn!(error = %err, "failed to persist final extraction task state");
        }
        self.deps.task_control_plane.untrack(task.id);
        task
    }

    async fn run_inner(
        &self,
        tenant_id: &str,
        task: &mut ExtractionTask,
        cancel: &CancellationToken,
    ) -> Result<(), ConectaError> {
        task.status = TaskStatus::Running;
        task.started_at = Some(Utc::now());
        self.deps.tasks.update(task).await?;

        let tenant = self
            .deps
            .tenants
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| ConectaError::Config(format!("unknown tenant {tenant_id}")))?;
        if !tenant.is_active {
            return Err(ConectaError::Config(format!(
                "tenant {tenant_id} is not active"
            )));
        }

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

        let login_plugin = plugin.clone();
        let discovery_email = email.clone();
        let discovery_password = password.clone();
        let discovery_session = self
            .deps
            .browser_pool
            .acquire(&tenant.upstream_url, cancel, move |page| async move {
                login_plugin.login(&page, &discovery_email, &discovery_password).await?;
                Ok(page)
            })
            .await
            .map_err(|err| ConectaError::Auth {
                tenant_id: tenant_id.to_string(),
                reason: err.to_string(),
            })?;

        let discovered = plugin.list_processes(discovery_session.page()).await?;
        self.deps.browser_pool.release(discovery_session).await;

        let mut groups: HashMap<String, Vec<DiscoveredProcess>> = HashMap::new();
        for item in discovered {
            if let Err(err) = validate_process_number(&item.process_number) {
                warn!(process_number = %item.process_number, error = %err, "dropping malformed process number from discovery");
                continue;
            }
            groups.entry(item.process_number.clone()).or_default().push(item);
        }
        task.result_summary.discovered = groups.len() as u32;

        let mut existing_by_number = HashMap::new();
        for process in self.deps.processes.list_for_tenant(tenant_id).await? {
            existing_by_number.insert(process.process_number.clone(), process);
        }

        let semaphore = Arc::new(Semaphore::new(self.deps.config.extractor_worker_limit.max(1)));
        let mut handles = Vec::with_capacity(groups.len());
        for (process_number, links) in groups {
            let semaphore = semaphore.clone();
            let pool = self.deps.browser_pool.clone();
            let plugin = plugin.clone();
            let tenant = tenant.clone();
            let email = email.clone();
            let password = password.clone();
            let existing = existing_by_number.remove(&process_number);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("extractor semaphore is never closed");
                process_one(
                    pool,
                    plugin,
                    tenant,
                    email,
                    password,
                    process_number,
                    links,
                    existing,
                    cancel,
                )
                .await
            }));
        }

        let mut pending_categorization = Vec::new();
        let mut new_documents_by_signer: HashMap<String, Vec<NewDocumentNotice>> = HashMap::new();
        let mut new_processes = 0u32;
        let mut updated_processes = 0u32;
        let mut new_documents = 0u32;
        let mut failures = 0u32;

        for handle in handles {
            match handle.await {
                Ok(ProcessOutcome::Upserted {
                    process,
                    is_new,
                    new_document_count,
                    notify,
                }) => {
                    self.deps.processes.upsert(&process).await?;
                    if is_new {
                        new_processes += 1;
                    } else {
                        updated_processes += 1;
                    }
                    new_documents += new_document_count as u32;
                    if let Some(note) = notify.pending_categorization {
                        pending_categorization.push(note);
                    }
                    for notice in notify.new_documents {
                        let signer = notice
                            .record
                            .signer
                            .clone()
                            .unwrap_or_else(|| "unknown".to_string());
                        new_documents_by_signer.entry(signer).or_default().push(notice);
                    }
                }
                Ok(ProcessOutcome::Failed { process_number, reason }) => {
                    warn!(process_number = %process_number, reason = %reason, "process extraction failed");
                    failures += 1;
                }
                Err(join_err) => {
                    warn!(error = %join_err, "process worker task panicked");
                    failures += 1;
                }
            }
        }

        task.result_summary = ExtractionSummary {
            discovered: task.result_summary.discovered,
            new_processes,
            updated_processes,
            new_documents,
            failures,
        };
        task.progress = 100;
        task.status = TaskStatus::Completed;
        task.finished_at = Some(Utc::now());

        self.deps
            .notifier
            .dispatch(pending_categorization, new_documents_by_signer)
            .await;
        Ok(())
    }
}

fn expose(secret: &SecretString) -> String {
    secret.expose_secret().to_string()
}
