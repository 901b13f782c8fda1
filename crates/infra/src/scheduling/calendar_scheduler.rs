//! Periodic calendar sync and webhook renewal.
//!
//! Two cron jobs share one [`JobScheduler`]: a sync pass over every
//! configured user and a webhook-renewal pass that re-registers channels
//! close to expiry. Each job run is wrapped in the job timeout; a run that
//! overlaps one still in flight for the same calendar is rejected by the
//! orchestrator's per-calendar lock and counted as an error, not retried.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cadence_core::SyncOrchestrator;
//! use cadence_infra::scheduling::{CalendarScheduler, CalendarSchedulerConfig, SchedulerResult};
//!
//! # async fn example(orchestrator: Arc<SyncOrchestrator>) -> SchedulerResult<()> {
//! let mut scheduler = CalendarScheduler::with_config(
//!     CalendarSchedulerConfig {
//!         sync_cron: "0 */15 * * * *".into(),
//!         ..Default::default()
//!     },
//!     orchestrator,
//! );
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use cadence_core::SyncOrchestrator;
use cadence_domain::{SchedulerConfig, SyncCounters};
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the calendar scheduler.
#[derive(Debug, Clone)]
pub struct CalendarSchedulerConfig {
    /// Six-field cron expression for the sync pass.
    pub sync_cron: String,
    /// Six-field cron expression for the webhook renewal pass.
    pub webhook_renewal_cron: String,
    /// Users whose calendars are synced.
    pub user_ids: Vec<Uuid>,
    /// Timeout applied to a single job execution.
    pub job_timeout: Duration,
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for CalendarSchedulerConfig {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for CalendarSchedulerConfig {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            sync_cron: config.sync_cron.clone(),
            webhook_renewal_cron: config.webhook_renewal_cron.clone(),
            user_ids: config.user_ids.clone(),
            job_timeout: Duration::from_secs(config.job_timeout_secs),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Outcome of one sync pass over the configured users.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncPassReport {
    pub users: usize,
    pub failed_users: usize,
    pub counters: SyncCounters,
}

/// Calendar scheduler with explicit lifecycle management.
pub struct CalendarScheduler {
    scheduler: Option<JobScheduler>,
    config: CalendarSchedulerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    orchestrator: Arc<SyncOrchestrator>,
}

impl CalendarScheduler {
    pub fn new(config: &SchedulerConfig, orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self::with_config(CalendarSchedulerConfig::from(config), orchestrator)
    }

    pub fn with_config(config: CalendarSchedulerConfig, orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            scheduler: None,
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            orchestrator,
        }
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: start_timeout.as_secs() })?
            .map_err(|err| SchedulerError::StartFailed(err.to_string()))?;

        self.scheduler = Some(scheduler_instance);

        let cancel = self.cancellation.clone();
        self.monitor_handle = Some(tokio::spawn(async move {
            Self::monitor_task(cancel).await;
        }));

        info!(users = self.config.user_ids.len(), "Calendar scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(mut scheduler) = self.scheduler.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();

        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: stop_timeout.as_secs() })?
            .map_err(|err| SchedulerError::StopFailed(err.to_string()))?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: join_timeout.as_secs() })?
                .map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        }

        info!("Calendar scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Run one sync pass immediately, outside the cron schedule.
    pub async fn run_sync_pass(&self) -> SyncPassReport {
        Self::sync_users(&self.orchestrator, &self.config.user_ids).await
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler =
            JobScheduler::new().await.map_err(|err| SchedulerError::CreationFailed(err.to_string()))?;

        let sync_job = {
            let orchestrator = self.orchestrator.clone();
            let users = self.config.user_ids.clone();
            let job_timeout = self.config.job_timeout;
            Job::new_async(self.config.sync_cron.as_str(), move |_id, _lock| {
                let orchestrator = orchestrator.clone();
                let users = users.clone();
                Box::pin(async move {
                    let started = Instant::now();
                    match tokio::time::timeout(job_timeout, Self::sync_users(&orchestrator, &users))
                        .await
                    {
                        Ok(report) if report.failed_users == 0 => debug!(
                            users = report.users,
                            processed = report.counters.processed,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Scheduled calendar sync finished"
                        ),
                        Ok(report) => warn!(
                            users = report.users,
                            failed_users = report.failed_users,
                            errors = report.counters.errors.len(),
                            "Scheduled calendar sync finished with failures"
                        ),
                        Err(_) => warn!(
                            timeout_secs = job_timeout.as_secs(),
                            "Scheduled calendar sync timed out"
                        ),
                    }
                })
            })
            .map_err(|err| SchedulerError::JobRegistrationFailed(err.to_string()))?
        };

        let renewal_job = {
            let orchestrator = self.orchestrator.clone();
            let users = self.config.user_ids.clone();
            let job_timeout = self.config.job_timeout;
            Job::new_async(self.config.webhook_renewal_cron.as_str(), move |_id, _lock| {
                let orchestrator = orchestrator.clone();
                let users = users.clone();
                Box::pin(async move {
                    if tokio::time::timeout(job_timeout, Self::renew_webhooks(&orchestrator, &users))
                        .await
                        .is_err()
                    {
                        warn!(timeout_secs = job_timeout.as_secs(), "Webhook renewal timed out");
                    }
                })
            })
            .map_err(|err| SchedulerError::JobRegistrationFailed(err.to_string()))?
        };

        for job in [sync_job, renewal_job] {
            let job_id = job.guid();
            scheduler
                .add(job)
                .await
                .map_err(|err| SchedulerError::JobRegistrationFailed(err.to_string()))?;
            debug!(%job_id, "Registered calendar job");
        }

        Ok(scheduler)
    }

    async fn sync_users(orchestrator: &SyncOrchestrator, users: &[Uuid]) -> SyncPassReport {
        let mut report = SyncPassReport { users: users.len(), ..Default::default() };
        if users.is_empty() {
            debug!("No users configured for calendar sync");
            return report;
        }

        for user_id in users {
            match orchestrator.sync_all_user_calendars(*user_id, false).await {
                Ok(counters) => {
                    if !counters.errors.is_empty() {
                        report.failed_users += 1;
                    }
                    report.counters.absorb(&counters);
                }
                Err(err) => {
                    report.failed_users += 1;
                    error!(%user_id, error = %err, "Calendar sync failed for user");
                    report.counters.errors.push(format!("user {user_id}: {err}"));
                }
            }
        }

        info!(
            users = report.users,
            failed_users = report.failed_users,
            created = report.counters.created,
            updated = report.counters.updated,
            deleted = report.counters.deleted,
            "Calendar sync pass completed"
        );
        report
    }

    async fn renew_webhooks(orchestrator: &SyncOrchestrator, users: &[Uuid]) {
        for user_id in users {
            match orchestrator.renew_user_webhooks(*user_id).await {
                Ok(active) => debug!(%user_id, active, "Webhooks renewed"),
                Err(err) => warn!(%user_id, error = %err, "Webhook renewal failed"),
            }
        }
    }

    async fn monitor_task(cancel: CancellationToken) {
        cancel.cancelled().await;
        debug!("Calendar scheduler monitor cancelled");
    }
}

impl Drop for CalendarScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("CalendarScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_is_derived_from_scheduler_section() {
        let section = SchedulerConfig {
            sync_cron: "0 */5 * * * *".into(),
            job_timeout_secs: 42,
            user_ids: vec![Uuid::nil()],
            ..SchedulerConfig::default()
        };
        let config = CalendarSchedulerConfig::from(&section);
        assert_eq!(config.sync_cron, "0 */5 * * * *");
        assert_eq!(config.webhook_renewal_cron, "0 0 * * * *");
        assert_eq!(config.job_timeout, Duration::from_secs(42));
        assert_eq!(config.user_ids, vec![Uuid::nil()]);
    }
}
