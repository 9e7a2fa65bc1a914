//! Cron scheduler for the periodic write-side jobs.
//!
//! Fires:
//! - Hourly delta collection from the chain into delegation snapshots
//! - Daily aggregation of the latest snapshots

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use log::info;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use super::{JobKind, JobTrigger};
use crate::{config::JobSettings, db::TransactionManager};

/// Cron scheduler that fires job triggers at fixed intervals.
pub struct CronScheduler<M> {
    trigger: Arc<JobTrigger<M>>,
    settings: JobSettings,
}

impl<M: TransactionManager + 'static> CronScheduler<M> {
    pub fn new(trigger: Arc<JobTrigger<M>>, settings: JobSettings) -> Self {
        Self { trigger, settings }
    }

    /// Starts the cron scheduler and runs until cancellation.
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        let mut scheduler = JobScheduler::new().await?;

        self.register(&scheduler, JobKind::Hourly, self.settings.hourly_interval_secs)
            .await?;
        self.register(&scheduler, JobKind::Daily, self.settings.daily_interval_secs)
            .await?;

        scheduler.start().await?;
        info!("Cron scheduler started with {} jobs", 2);

        cancellation_token.cancelled().await;
        info!("Cron scheduler shutting down...");

        scheduler.shutdown().await?;
        Ok(())
    }

    async fn register(&self, scheduler: &JobScheduler, kind: JobKind, interval: u64) -> Result<()> {
        let trigger = self.trigger.clone();

        let job = Job::new_repeated_async(Duration::from_secs(interval), move |_uuid, _lock| {
            let trigger = trigger.clone();
            Box::pin(async move {
                // Detached: the scheduler tick does not wait for the run
                let _ = trigger.trigger(kind);
            })
        })?;

        scheduler.add(job).await?;
        info!("Registered {} job (every {}s)", kind, interval);
        Ok(())
    }
}
