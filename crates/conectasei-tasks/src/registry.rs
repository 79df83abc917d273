//! Process-wide task-id → task-status registry. In-memory state is
//! authoritative only while a task is actively running; once a task
//! leaves the registry (completion, or a restart that never repopulated
//! it) a lookup falls back to the durable row.

use std::sync::Arc;

use conectasei_persistence::{DownloadTaskRepository, ExtractionTaskRepository};
use conectasei_types::domain::{DownloadTask, ExtractionTask, TaskStatus};
use conectasei_types::error::ConectaError;
use dashmap::DashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
enum TaskRecord {
    Extraction(ExtractionTask),
    Download(DownloadTask),
}

/// A kind-erased view over either task type, for callers (the API) that
/// only need status/progress.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub id: Uuid,
    pub status: TaskStatus,
    /// `None` for download tasks, which carry no scalar progress field.
    pub progress: Option<u8>,
}

impl From<&TaskRecord> for TaskSnapshot {
    fn from(record: &TaskRecord) -> Self {
        match record {
            TaskRecord::Extraction(task) => TaskSnapshot {
                id: task.id,
                status: task.status,
                progress: Some(task.progress),
            },
            TaskRecord::Download(task) => TaskSnapshot {
                id: task.id,
                status: task.status,
                progress: None,
            },
        }
    }
}

pub struct TaskControlPlaneDeps {
    pub extraction_tasks: Arc<ExtractionTaskRepository>,
    pub download_tasks: Arc<DownloadTaskRepository>,
}

pub struct TaskControlPlane {
    deps: TaskControlPlaneDeps,
    registry: DashMap<Uuid, TaskRecord>,
}

impl TaskControlPlane {
    pub fn new(deps: TaskControlPlaneDeps) -> Self {
        Self {
            deps,
            registry: DashMap::new(),
        }
    }

    /// Mark every task still `pending`/`running` from a prior process
    /// lifetime as `failed` with reason `orphaned`. Call once at startup,
    /// before the scheduler or any API surface starts accepting work.
    #[instrument(skip(self))]
    pub async fn recover_orphans(&self) -> Result<(), ConectaError> {
        let unfinished_extractions = self.deps.extraction_tasks.list_unfinished().await?;
        for task in &unfinished_extractions {
            warn!(task_id = %task.id, tenant_id = %task.tenant_id, "recovering orphaned extraction task");
            self.deps.extraction_tasks.mark_orphaned(task.id).await?;
        }
        let unfinished_downloads = self.deps.download_tasks.list_unfinished().await?;
        for task in &unfinished_downloads {
            warn!(task_id = %task.id, process_id = %task.process_id, "recovering orphaned download task");
            self.deps.download_tasks.mark_orphaned(task.id).await?;
        }
        info!(
            extractions = unfinished_extractions.len(),
            downloads = unfinished_downloads.len(),
            "orphan recovery complete"
        );
        Ok(())
    }

    pub fn track_extraction(&self, task: ExtractionTask) {
        self.registry.insert(task.id, TaskRecord::Extraction(task));
    }

    pub fn track_download(&self, task: DownloadTask) {
        self.registry.insert(task.id, TaskRecord::Download(task));
    }

    /// Drop a task from the live registry once it has reached a terminal
    /// state and its final row has been persisted. Safe to call even if
    /// the task was never tracked.
    pub fn untrack(&self, task_id: Uuid) {
        self.registry.remove(&task_id);
    }

    /// Current status for a task: the in-memory copy if it is still
    /// tracked, otherwise whatever the durable store has (which is `None`
    /// only if the id is unknown to either).
    #[instrument(skip(self))]
    pub async fn get(&self, task_id: Uuid) -> Result<Option<TaskSnapshot>, ConectaError> {
        if let Some(record) = self.registry.get(&task_id) {
            return Ok(Some(TaskSnapshot::from(&*record)));
        }
        if let Some(task) = self.deps.extraction_tasks.find_by_id(task_id).await? {
            return Ok(Some(TaskSnapshot {
                id: task.id,
                status: task.status,
                progress: Some(task.progress),
            }));
        }
        if let Some(task) = self.deps.download_tasks.find_by_id(task_id).await? {
            return Ok(Some(TaskSnapshot {
                id: task.id,
                status: task.status,
                progress: None,
            }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use conectasei_types::domain::ExtractionSummary;

    fn sample_task() -> ExtractionTask {
        ExtractionTask {
            id: Uuid::new_v4(),
            tenant_id: "t1".to_string(),
            status: TaskStatus::Running,
            started_at: Some(Utc::now()),
            finished_at: None,
            progress: 42,
            result_summary: ExtractionSummary::default(),
            error_message: None,
        }
    }

    #[test]
    fn snapshot_carries_progress_for_extraction_tasks() {
        let record = TaskRecord::Extraction(sample_task());
        let snapshot = TaskSnapshot::from(&record);
        assert_eq!(snapshot.progress, Some(42));
        assert_eq!(snapshot.status, TaskStatus::Running);
    }
}
