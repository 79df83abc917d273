//! Entry point for the background worker process: parses CLI/env
//! configuration, wires up [`WorkerService`], and runs until `Ctrl+C`.

mod service;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use conectasei_types::config::PipelineConfig;
use tracing_subscriber::EnvFilter;

use crate::service::{WorkerService, WorkerServiceConfig};

#[derive(Debug, Parser)]
#[command(name = "conectasei-worker", about = "ConectaSEI extraction and download worker")]
struct Args {
    /// Disable the scheduler loop, e.g. to run a worker that only ever
    /// serves on-demand extraction/download requests dispatched by another
    /// process sharing the same database.
    #[arg(long, env = "CONECTASEI_DISABLE_SCHEDULER")]
    disable_scheduler: bool,

    #[arg(long, env = "EXTRACTOR_WORKER_LIMIT")]
    extractor_worker_limit: Option<usize>,

    #[arg(long, env = "DOWNLOADER_WORKER_LIMIT")]
    downloader_worker_limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let args = Args::parse();

    let mut pipeline = PipelineConfig::from_env();
    if let Some(limit) = args.extractor_worker_limit {
        pipeline.extractor_worker_limit = limit;
    }
    if let Some(limit) = args.downloader_worker_limit {
        pipeline.downloader_worker_limit = limit;
    }

    let config = WorkerServiceConfig {
        pipeline,
        enable_scheduler: !args.disable_scheduler,
    };

    let service = WorkerService::new(config).await?;

    tokio::select! {
        _ = service.run_until_cancelled(idle()) => {}
        result = tokio::signal::ctrl_c() => {
            result.ok();
            tracing::info!("shutdown signal received");
        }
    }

    service.stop().await?;
    Ok(())
}

/// No HTTP surface lives in this process, so there is nothing else to await
/// on the happy path besides the shutdown signal; this keeps the `select!`
/// symmetric rather than special-casing "just wait for ctrl_c".
async fn idle() {
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}
