//! Cron-style job scheduler using tokio-cron-scheduler.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crosspost_publisher::OverdueScanner;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Six-field cron expression (with seconds) for the overdue scan.
    pub overdue_scan_cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            overdue_scan_cron: "0 * * * * *".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: std::env::var("SCHEDULER_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.enabled),
            overdue_scan_cron: std::env::var("OVERDUE_SCAN_CRON")
                .unwrap_or(defaults.overdue_scan_cron),
        }
    }
}

/// Cron job scheduler wrapper.
pub struct Scheduler {
    inner: JobScheduler,
    config: SchedulerConfig,
}

impl Scheduler {
    pub async fn new(config: SchedulerConfig) -> Result<Self, JobSchedulerError> {
        let inner = JobScheduler::new().await?;
        Ok(Self { inner, config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Add a cron job.
    pub async fn add_cron<F, Fut>(
        &self,
        schedule: &str,
        task: F,
    ) -> Result<uuid::Uuid, JobSchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let job = Job::new_async(schedule, move |_uuid, _lock| {
            let task = task.clone();
            Box::pin(async move {
                task().await;
            })
        })?;

        let id = self.inner.add(job).await?;
        tracing::info!(schedule = %schedule, job_id = %id, "Cron job registered");
        Ok(id)
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        if !self.config.enabled {
            tracing::info!("Scheduler disabled");
            return Ok(());
        }

        self.inner.start().await?;
        tracing::info!("Scheduler started");
        Ok(())
    }

    /// Stop the scheduler.
    pub async fn shutdown(&mut self) -> Result<(), JobSchedulerError> {
        self.inner.shutdown().await?;
        tracing::info!("Scheduler stopped");
        Ok(())
    }
}

/// Register the periodic overdue scan.
///
/// Overlapping runs are harmless: a post already being dispatched is skipped
/// through its target leases.
pub async fn schedule_overdue_scan(
    scheduler: &Scheduler,
    scanner: Arc<OverdueScanner>,
) -> Result<uuid::Uuid, JobSchedulerError> {
    let schedule = scheduler.config().overdue_scan_cron.clone();
    scheduler
        .add_cron(&schedule, move || {
            let scanner = scanner.clone();
            async move {
                match scanner.run_once().await {
                    Ok(report) if report.found > 0 || report.skipped > 0 => tracing::info!(
                        found = report.found,
                        dispatched = report.dispatched,
                        skipped = report.skipped,
                        errors = report.errors,
                        "Overdue scan finished"
                    ),
                    Ok(_) => tracing::debug!("Overdue scan found nothing"),
                    Err(e) => tracing::error!(error = %e, "Overdue scan failed"),
                }
            }
        })
        .await
}
