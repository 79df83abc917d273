//! Wires every pipeline component into one long-running process: connects
//! the database, launches the shared browser pool, loads the plugin
//! registry, recovers orphaned tasks, and starts the scheduler. Mirrors
//! the shape of a background worker service — construction does all the
//! one-time setup, `stop` tears it down in reverse order.

use std::sync::Arc;

use anyhow::{Context, Result};
use conectasei_browser::{BrowserPool, BrowserPoolConfig};
use conectasei_downloader::{Downloader, DownloaderDeps};
use conectasei_extractor::{Extractor, ExtractorDeps};
use conectasei_objectstore::{ObjectStoreClient, ObjectStoreConfig};
use conectasei_persistence::{
    DocumentHistoryRepository, DownloadTaskRepository, ExtractionTaskRepository, ProcessRepository,
    ScheduleRepository, TenantRepository,
};
use conectasei_scheduler::{Scheduler, SchedulerDeps};
use conectasei_scrapers::ScraperRegistry;
use conectasei_tasks::{TaskControlPlane, TaskControlPlaneDeps};
use conectasei_types::config::PipelineConfig;
use conectasei_types::ports::LoggingNotificationDispatcher;
use conectasei_vault::CredentialVault;
use tracing::info;

/// Top-level process configuration: the pipeline's own env-driven config
/// plus the one flag that is this binary's concern rather than the
/// pipeline's.
#[derive(Debug, Clone)]
pub struct WorkerServiceConfig {
    pub pipeline: PipelineConfig,
    pub enable_scheduler: bool,
}

impl Default for WorkerServiceConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::from_env(),
            enable_scheduler: true,
        }
    }
}

pub struct WorkerService {
    config: WorkerServiceConfig,
    browser_pool: Arc<BrowserPool>,
    extractor: Arc<Extractor>,
    downloader: Arc<Downloader>,
    task_control_plane: Arc<TaskControlPlane>,
    scheduler: Option<Arc<Scheduler>>,
}

impl WorkerService {
    pub async fn new(config: WorkerServiceConfig) -> Result<Self> {
        info!("connecting to database");
        let pool = conectasei_persistence::connect(&config.pipeline.database_url)
            .await
            .context("failed to connect to database")?;
        let pool_arc = Arc::new(pool.clone());

        let tenants = Arc::new(TenantRepository::new(pool_arc.clone()));
        let processes = Arc::new(ProcessRepository::new(pool_arc.clone()));
        let extraction_tasks = Arc::new(ExtractionTaskRepository::new(pool_arc.clone()));
        let download_tasks = Arc::new(DownloadTaskRepository::new(pool_arc.clone()));
        let _document_history = Arc::new(DocumentHistoryRepository::new(pool_arc.clone()));
        let schedules = Arc::new(ScheduleRepository::new(pool_arc.clone()));

        info!("decrypting vault and loading scraper registry");
        let vault = Arc::new(
            CredentialVault::new(&config.pipeline.symmetric_encryption_key)
                .context("failed to initialize credential vault")?,
        );
        let registry = Arc::new(ScraperRegistry::with_builtin_plugins());

        info!("launching headless browser pool");
        let browser_pool = Arc::new(
            BrowserPool::launch(BrowserPoolConfig {
                max_concurrent_sessions: config
                    .pipeline
                    .extractor_worker_limit
                    .max(config.pipeline.downloader_worker_limit),
                nav_timeout: config.pipeline.browser_nav_timeout,
            })
            .await
            .context("failed to launch browser pool")?,
        );

        let object_store = Arc::new(ObjectStoreClient::new(ObjectStoreConfig {
            bucket: config.pipeline.object_store_bucket.clone(),
            credentials_profile: config.pipeline.object_store_credentials.clone(),
            endpoint_url: None,
        }));

        let notifier = Arc::new(LoggingNotificationDispatcher);

        let task_control_plane = Arc::new(TaskControlPlane::new(TaskControlPlaneDeps {
            extraction_tasks: extraction_tasks.clone(),
            download_tasks: download_tasks.clone(),
        }));
        info!("recovering orphaned tasks from a prior process lifetime");
        task_control_plane
            .recover_orphans()
            .await
            .context("failed to recover orphaned tasks")?;

        let extractor = Arc::new(Extractor::new(ExtractorDeps {
            tenants: tenants.clone(),
            processes: processes.clone(),
            tasks: extraction_tasks.clone(),
            registry: registry.clone(),
            browser_pool: browser_pool.clone(),
            vault: vault.clone(),
            notifier,
            task_control_plane: task_control_plane.clone(),
            config: config.pipeline.clone(),
        }));

        let downloader = Arc::new(Downloader::new(DownloaderDeps {
            pool,
            processes: processes.clone(),
            tenants: tenants.clone(),
            tasks: download_tasks.clone(),
            registry: registry.clone(),
            browser_pool: browser_pool.clone(),
            vault: vault.clone(),
            object_store,
            task_control_plane: task_control_plane.clone(),
            config: config.pipeline.clone(),
        }));

        let scheduler = if config.enable_scheduler {
            let scheduler = Arc::new(Scheduler::new(SchedulerDeps {
                schedules,
                tenants: tenants.clone(),
                extractor: extractor.clone(),
                config: config.pipeline.clone(),
            }));
            scheduler.start().await.context("failed to start scheduler")?;
            Some(scheduler)
        } else {
            None
        };

        Ok(Self {
            config,
            browser_pool,
            extractor,
            downloader,
            task_control_plane,
            scheduler,
        })
    }

    pub fn extractor(&self) -> Arc<Extractor> {
        self.extractor.clone()
    }

    pub fn downloader(&self) -> Arc<Downloader> {
        self.downloader.clone()
    }

    pub fn task_control_plane(&self) -> Arc<TaskControlPlane> {
        self.task_control_plane.clone()
    }

    /// Run until externally cancelled. Everything happens in the
    /// scheduler's own background jobs and in whatever invokes the
    /// extractor/downloader directly (the out-of-scope API layer); this
    /// just blocks for as long as the process should stay up.
    pub async fn run_until_cancelled(&self, shutdown: impl std::future::Future<Output = ()>) {
        info!(
            scheduler_enabled = self.config.enable_scheduler,
            "worker service running"
        );
        shutdown.await;
    }

    pub async fn stop(&self) -> Result<()> {
        if let Some(scheduler) = &self.scheduler {
            info!("draining scheduled jobs");
            scheduler.shutdown().await;
        }
        info!("closing browser pool");
        self.browser_pool
            .shutdown()
            .await
            .context("failed to close browser pool cleanly")?;
        Ok(())
    }
}
