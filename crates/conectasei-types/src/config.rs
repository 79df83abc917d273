//! Environment-driven configuration for the pipeline.
//!
//! All values are overridable through environment variables; every default
//! mirrors the binding defaults called out in the external interfaces.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub database_url: String,
    pub object_store_bucket: String,
    pub object_store_credentials: Option<String>,
    pub symmetric_encryption_key: String,
    pub extractor_worker_limit: usize,
    pub downloader_worker_limit: usize,
    pub browser_nav_timeout: Duration,
    pub extraction_run_timeout: Duration,
    pub download_task_timeout: Duration,
    pub scheduler_shutdown_grace: Duration,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64_or(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize_or(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_url: env_or("DATABASE_URL", "postgres://localhost/conectasei"),
            object_store_bucket: env_or("OBJECT_STORE_BUCKET", "conectasei-documents"),
            object_store_credentials: std::env::var("OBJECT_STORE_CREDENTIALS").ok(),
            symmetric_encryption_key: env_or("SYMMETRIC_ENCRYPTION_KEY", ""),
            extractor_worker_limit: env_usize_or("EXTRACTOR_WORKER_LIMIT", 5),
            downloader_worker_limit: env_usize_or("DOWNLOADER_WORKER_LIMIT", 3),
            browser_nav_timeout: Duration::from_millis(env_u64_or("BROWSER_NAV_TIMEOUT_MS", 30_000)),
            extraction_run_timeout: Duration::from_millis(env_u64_or(
                "EXTRACTION_RUN_TIMEOUT_MS",
                1_800_000,
            )),
            download_task_timeout: Duration::from_millis(env_u64_or(
                "DOWNLOAD_TASK_TIMEOUT_MS",
                1_800_000,
            )),
            scheduler_shutdown_grace: Duration::from_millis(env_u64_or(
                "SCHEDULER_SHUTDOWN_GRACE_MS",
                30_000,
            )),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self::default()
    }
}
