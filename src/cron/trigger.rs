//! Fire-and-forget job triggering with one run in flight per job kind.

use std::{fmt, sync::Arc};

use log::{error, info, warn};
use tokio::{sync::Mutex, task::JoinHandle, time::Instant};

use super::jobs::{daily_aggregates, hourly_deltas, JobContext};
use crate::db::TransactionManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Hourly,
    Daily,
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Hourly => "hourly_deltas",
            JobKind::Daily => "daily_aggregates",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Starts job runs on detached tasks.
///
/// Each run gets its own deadline and never reports failure back to the
/// caller; the outcome is only logged. A trigger while a run of the same
/// kind is still in flight is skipped.
pub struct JobTrigger<M> {
    ctx: JobContext<M>,
    hourly: Arc<Mutex<()>>,
    daily: Arc<Mutex<()>>,
}

impl<M: TransactionManager + 'static> JobTrigger<M> {
    pub fn new(ctx: JobContext<M>) -> Self {
        Self {
            ctx,
            hourly: Arc::new(Mutex::new(())),
            daily: Arc::new(Mutex::new(())),
        }
    }

    fn guard(&self, kind: JobKind) -> &Arc<Mutex<()>> {
        match kind {
            JobKind::Hourly => &self.hourly,
            JobKind::Daily => &self.daily,
        }
    }

    /// Returns the handle of the spawned run, or `None` if the trigger was
    /// skipped. The handle resolves once the run is over and never carries
    /// the job's error.
    pub fn trigger(&self, kind: JobKind) -> Option<JoinHandle<()>> {
        let running = match self.guard(kind).clone().try_lock_owned() {
            Ok(running) => running,
            Err(_) => {
                warn!("Skipping {} trigger, previous run still in progress", kind);
                return None;
            },
        };

        let ctx = self.ctx.clone();
        let deadline = Instant::now() + ctx.settings.timeout();

        Some(tokio::spawn(async move {
            let _running = running;
            let result = match kind {
                JobKind::Hourly => hourly_deltas::run(&ctx, deadline).await,
                JobKind::Daily => daily_aggregates::run(&ctx, deadline).await,
            };
            match result {
                Ok(rows) => info!("{} run finished, {} rows written", kind, rows),
                Err(e) => error!("{} run failed: {}", kind, e),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        chain::{ChainReader, DelegationEntry, MockChainReader},
        config::JobSettings,
        cron::jobs::testing::{context, entry, settings},
        db::memory::MemoryStore,
    };

    struct SlowReader(Duration);

    #[async_trait]
    impl ChainReader for SlowReader {
        async fn fetch_delegations(&self) -> anyhow::Result<Vec<DelegationEntry>> {
            tokio::time::sleep(self.0).await;
            Ok(vec![entry("cosmos1a", "100")])
        }
    }

    #[tokio::test]
    async fn test_trigger_runs_job_in_background() {
        let store = MemoryStore::new();
        let mut reader = MockChainReader::new();
        reader
            .expect_fetch_delegations()
            .times(1)
            .returning(|| Ok(vec![entry("cosmos1a", "8000")]));
        let trigger = JobTrigger::new(context(&store, reader, settings()));

        let handle = trigger.trigger(JobKind::Hourly).unwrap();
        handle.await.unwrap();

        assert_eq!(store.snapshots().len(), 1);
        assert_eq!(store.snapshots()[0].amount, 8_000);
    }

    #[tokio::test]
    async fn test_failed_run_is_swallowed() {
        let store = MemoryStore::new();
        let mut reader = MockChainReader::new();
        reader
            .expect_fetch_delegations()
            .returning(|| Err(anyhow::anyhow!("connection refused")));
        let trigger = JobTrigger::new(context(&store, reader, settings()));

        let handle = trigger.trigger(JobKind::Hourly).unwrap();
        assert!(handle.await.is_ok());
        assert_eq!(store.tx_stats().rollbacks, 4);

        // The guard is released after a failed run
        let handle = trigger.trigger(JobKind::Hourly).unwrap();
        assert!(handle.await.is_ok());
        assert_eq!(store.tx_stats().rollbacks, 8);
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_skipped() {
        let store = MemoryStore::new();
        let trigger = JobTrigger::new(context(
            &store,
            SlowReader(Duration::from_millis(200)),
            settings(),
        ));

        let first = trigger.trigger(JobKind::Hourly).unwrap();
        assert!(trigger.trigger(JobKind::Hourly).is_none());

        // Other kinds are not blocked
        let daily = trigger.trigger(JobKind::Daily).unwrap();
        daily.await.unwrap();

        first.await.unwrap();
        assert_eq!(store.snapshots().len(), 1);

        let again = trigger.trigger(JobKind::Hourly).unwrap();
        again.await.unwrap();
        assert_eq!(store.snapshots().len(), 2);
    }

    #[tokio::test]
    async fn test_run_is_bounded_by_timeout() {
        let store = MemoryStore::new();
        let trigger = JobTrigger::new(context(
            &store,
            SlowReader(Duration::from_secs(30)),
            JobSettings {
                timeout_secs: 1,
                ..settings()
            },
        ));

        let handle = trigger.trigger(JobKind::Hourly).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("run outlived its deadline")
            .unwrap();

        let stats = store.tx_stats();
        assert_eq!(stats.begins, 1);
        assert_eq!(stats.aborted, 1);
        assert!(store.snapshots().is_empty());
    }

    #[test]
    fn test_job_kind_names() {
        assert_eq!(JobKind::Hourly.to_string(), "hourly_deltas");
        assert_eq!(JobKind::Daily.to_string(), "daily_aggregates");
    }
}
