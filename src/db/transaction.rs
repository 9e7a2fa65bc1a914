//! Retrying transactional envelope for write-side jobs.
//!
//! A unit of work runs inside one transaction per attempt. Failures roll the
//! attempt back and the whole begin -> work -> commit cycle is retried after a
//! fixed delay. Running out of time is terminal: an expired deadline is never
//! retried.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use log::{error, warn};
use tokio::time::Instant;

use super::repository::SnapshotStore;

/// Transaction isolation level, `ReadCommitted` unless a job asks otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// An open transaction. Finishing consumes it; dropping an unfinished one
/// must abort it.
#[async_trait]
pub trait Transaction: SnapshotStore + Sized + 'static {
    async fn commit(self) -> anyhow::Result<()>;
    async fn rollback(self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait TransactionManager: Send + Sync {
    type Tx: Transaction;

    async fn begin(&self, isolation: IsolationLevel) -> anyhow::Result<Self::Tx>;
}

#[derive(Debug, thiserror::Error)]
pub enum TxError {
    #[error("transaction deadline exceeded after {attempts} attempt(s)")]
    DeadlineExceeded { attempts: u32 },
    #[error("failed to begin transaction: {0:#}")]
    Begin(anyhow::Error),
    #[error("{0:#}")]
    Work(anyhow::Error),
    #[error("failed to commit transaction: {0:#}")]
    Commit(anyhow::Error),
    #[error("tx err: {work:#}, rb err: {rollback:#}")]
    Rollback {
        work: anyhow::Error,
        rollback: anyhow::Error,
    },
}

impl TxError {
    pub fn is_deadline(&self) -> bool {
        matches!(self, TxError::DeadlineExceeded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retry_limit: u32,
    /// Pause between two attempts
    pub delay: Duration,
    pub isolation: IsolationLevel,
    pub deadline: Option<Instant>,
}

impl RetryPolicy {
    pub fn new(retry_limit: u32, delay: Duration) -> Self {
        Self {
            retry_limit,
            delay,
            isolation: IsolationLevel::default(),
            deadline: None,
        }
    }

    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn attempts(&self) -> u32 {
        self.retry_limit.saturating_add(1)
    }

    fn expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Runs `work` in a transaction, retrying the whole cycle up to
/// `policy.retry_limit` more times.
///
/// Every attempt re-executes `work` from scratch against a fresh transaction,
/// so `work` must tolerate being re-run. Returns the error of the last attempt
/// once all attempts are used up.
pub async fn execute_with_retry<M, F>(
    manager: &M,
    policy: &RetryPolicy,
    work: F,
) -> Result<(), TxError>
where
    M: TransactionManager,
    F: for<'a> Fn(&'a M::Tx) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync,
{
    let attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        if policy.expired() {
            return Err(TxError::DeadlineExceeded { attempts: attempt });
        }
        attempt += 1;

        let result = match policy.deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, execute_once(manager, policy.isolation, &work))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(TxError::DeadlineExceeded { attempts: attempt }),
                }
            },
            None => execute_once(manager, policy.isolation, &work).await,
        };

        let err = match result {
            Ok(()) => return Ok(()),
            Err(err) if err.is_deadline() => return Err(err),
            Err(err) => err,
        };

        if let TxError::Rollback { .. } = err {
            error!("Rollback failed (attempt {}/{}): {}", attempt, attempts, err);
        }

        if attempt >= attempts {
            return Err(err);
        }

        if let Some(deadline) = policy.deadline {
            if Instant::now() + policy.delay >= deadline {
                warn!(
                    "Transaction attempt {}/{} failed: {}, no time left to retry",
                    attempt, attempts, err
                );
                return Err(TxError::DeadlineExceeded { attempts: attempt });
            }
        }

        warn!(
            "Transaction attempt {}/{} failed: {}, retrying in {:?}",
            attempt, attempts, err, policy.delay
        );
        tokio::time::sleep(policy.delay).await;
    }
}

async fn execute_once<M, F>(manager: &M, isolation: IsolationLevel, work: &F) -> Result<(), TxError>
where
    M: TransactionManager,
    F: for<'a> Fn(&'a M::Tx) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync,
{
    let tx = manager.begin(isolation).await.map_err(TxError::Begin)?;

    match work(&tx).await {
        Ok(()) => tx.commit().await.map_err(TxError::Commit),
        Err(work_err) => match tx.rollback().await {
            Ok(()) => Err(TxError::Work(work_err)),
            Err(rollback) => Err(TxError::Rollback {
                work: work_err,
                rollback,
            }),
        },
    }
}
