//! Single-process in-memory scheduler: one background job per active
//! schedule, each sleeping until its next fire and then invoking the
//! extractor for that tenant. Missed fires are never queued — a fire that
//! lands while the tenant's prior run is still active coalesces onto it
//! through the extractor's own in-flight check, which is exactly the
//! "drop, don't queue" behavior called for here.

use std::sync::Arc;

use chrono::Utc;
use conectasei_extractor::Extractor;
use conectasei_persistence::{ScheduleRepository, TenantRepository};
use conectasei_types::config::PipelineConfig;
use conectasei_types::domain::ExtractionSchedule;
use conectasei_types::error::ConectaError;
use conectasei_utils::CancellationToken;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::expression::{parse_expression, JobSchedule};

pub struct SchedulerDeps {
    pub schedules: Arc<ScheduleRepository>,
    pub tenants: Arc<TenantRepository>,
    pub extractor: Arc<Extractor>,
    pub config: PipelineConfig,
}

struct JobHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct Scheduler {
    deps: SchedulerDeps,
    jobs: DashMap<String, JobHandle>,
}

impl Scheduler {
    pub fn new(deps: SchedulerDeps) -> Self {
        Self {
            deps,
            jobs: DashMap::new(),
        }
    }

    /// Load every active schedule and start its job. Called once at
    /// startup.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), ConectaError> {
        let schedules = self.deps.schedules.list_active().await?;
        info!(count = schedules.len(), "starting scheduled extraction jobs");
        for schedule in schedules {
            if let Err(err) = self.spawn(schedule.clone()) {
                warn!(tenant_id = %schedule.tenant_id, error = %err, "failed to schedule tenant, skipping");
            }
        }
        Ok(())
    }

    /// Apply a schedule mutation from the API: `is_active = false` removes
    /// the live job, `true` (re)installs it with the current expression.
    pub fn apply(&self, schedule: ExtractionSchedule) -> Result<(), ConectaError> {
        if !schedule.is_active {
            self.remove(&schedule.tenant_id);
            return Ok(());
        }
        self.spawn(schedule)
    }

    pub fn remove(&self, tenant_id: &str) {
        if let Some((_, handle)) = self.jobs.remove(tenant_id) {
            handle.cancel.cancel();
            handle.task.abort();
        }
    }

    fn spawn(&self, schedule: ExtractionSchedule) -> Result<(), ConectaError> {
        let job_schedule = parse_expression(schedule.kind, &schedule.expression)?;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_job(
            self.deps.extractor.clone(),
            self.deps.tenants.clone(),
            schedule.tenant_id.clone(),
            job_schedule,
            cancel.clone(),
        ));
        if let Some(previous) = self.jobs.insert(schedule.tenant_id.clone(), JobHandle { cancel, task }) {
            previous.cancel.cancel();
            previous.task.abort();
        }
        Ok(())
    }

    /// Cancel every live job, waiting up to the configured grace period
    /// for each before forcing termination.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let tenant_ids: Vec<String> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        for tenant_id in tenant_ids {
            let Some((_, handle)) = self.jobs.remove(&tenant_id) else {
                continue;
            };
            handle.cancel.cancel();
            let abort_handle = handle.task.abort_handle();
            if tokio::time::timeout(self.deps.config.scheduler_shutdown_grace, handle.task)
                .await
                .is_err()
            {
                warn!(tenant_id = %tenant_id, "scheduled job exceeded shutdown grace period, forcing termination");
                abort_handle.abort();
            }
        }
    }
}

async fn run_job(
    extractor: Arc<Extractor>,
    tenants: Arc<TenantRepository>,
    tenant_id: String,
    schedule: JobSchedule,
    cancel: CancellationToken,
) {
    loop {
        let sleep_for = match &schedule {
            JobSchedule::Interval(duration) => *duration,
            JobSchedule::Cron(cron_schedule) => match next_cron_delay(cron_schedule) {
                Some(delay) => delay,
                None => {
                    warn!(tenant_id = %tenant_id, "cron schedule has no upcoming fire, stopping job");
                    return;
                }
            },
        };

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = cancel.cancelled() => return,
        }

        match tenants.find_by_id(&tenant_id).await {
            Ok(Some(tenant)) if tenant.is_active => {
                if let Err(err) = extractor.run_for_tenant(&tenant_id, cancel.clone()).await {
                    if err.is_run_fatal() {
                        warn!(tenant_id = %tenant_id, error = %err, "scheduled extraction failed fatally, stopping job");
                        return;
                    }
                    warn!(tenant_id = %tenant_id, error = %err, "scheduled extraction failed");
                }
            }
            Ok(Some(_)) => {
                debug!(tenant_id = %tenant_id, "tenant is inactive, skipping scheduled fire");
            }
            Ok(None) => {
                warn!(tenant_id = %tenant_id, "scheduled tenant no longer exists, stopping job");
                return;
            }
            Err(err) => {
                warn!(tenant_id = %tenant_id, error = %err, "failed to look up tenant for scheduled fire");
            }
        }
    }
}

fn next_cron_delay(schedule: &cron::Schedule) -> Option<std::time::Duration> {
    let now = Utc::now();
    let next = schedule.upcoming(Utc).next()?;
    (next - now).to_std().ok()
}
