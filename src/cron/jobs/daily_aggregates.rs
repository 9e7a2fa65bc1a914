//! Daily aggregation.
//!
//! Copies the newest snapshot amount of every (validator, delegator) pair
//! into a daily aggregate dated today in the reference timezone. Rows are
//! appended; running twice on one day yields two rows per pair.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use anyhow::Context;
use futures::FutureExt;
use log::{info, warn};
use tokio::time::Instant;

use super::JobContext;
use crate::{
    cache::namespace,
    db::{
        execute_with_retry, models::NewDailyAggregate, SnapshotStore, TransactionManager, TxError,
    },
    utils::now_in,
};

/// Runs one aggregation and returns the number of aggregates written.
pub async fn run<M: TransactionManager>(
    ctx: &JobContext<M>,
    deadline: Instant,
) -> Result<usize, TxError> {
    info!("Starting daily_aggregates job...");
    let start = std::time::Instant::now();

    let written = Arc::new(AtomicUsize::new(0));
    let policy = ctx.retry_policy(deadline);

    let result = execute_with_retry(ctx.manager.as_ref(), &policy, |tx| {
        let offset = ctx.offset;
        let written = written.clone();
        async move {
            let date = now_in(offset).date_naive();
            let latest = tx
                .latest_snapshots()
                .await
                .context("Failed to load latest snapshots")?;

            let mut count = 0;
            for snapshot in latest {
                let aggregate = NewDailyAggregate {
                    validator_address: snapshot.validator_address,
                    delegator_address: snapshot.delegator_address,
                    date,
                    total_amount: snapshot.amount,
                };
                tx.create_daily_aggregate(&aggregate)
                    .await
                    .context("Failed to create daily aggregate")?;
                count += 1;
            }

            written.store(count, Ordering::SeqCst);
            Ok(())
        }
        .boxed()
    })
    .await;

    if let Err(e) = ctx.cache.clear_namespaces(&[namespace::DAILY_SNAPSHOT]).await {
        warn!("daily_aggregates could not invalidate caches: {}", e);
    }

    result?;

    let count = written.load(Ordering::SeqCst);
    info!(
        "Completed daily_aggregates job in {:?} ({} aggregates)",
        start.elapsed(),
        count
    );
    Ok(count)
}
