//! Hourly delta collection.
//!
//! Pulls the current delegations from the chain and appends one snapshot per
//! delegation, carrying the change against the previous snapshot of the same
//! (validator, delegator) pair. Invalidates the hourly snapshot and delegator
//! history caches afterwards, whatever the outcome.

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
        execute_with_retry,
        models::{balance_change, NewDelegationSnapshot},
        SnapshotStore, TransactionManager, TxError,
    },
    utils::now_in,
};

/// Runs one collection and returns the number of snapshots written.
pub async fn run<M: TransactionManager>(
    ctx: &JobContext<M>,
    deadline: Instant,
) -> Result<usize, TxError> {
    info!("Starting hourly_deltas job...");
    let start = std::time::Instant::now();

    let written = Arc::new(AtomicUsize::new(0));
    let policy = ctx.retry_policy(deadline);

    let result = execute_with_retry(ctx.manager.as_ref(), &policy, |tx| {
        let reader = ctx.reader.clone();
        let offset = ctx.offset;
        let written = written.clone();
        async move {
            let entries = reader
                .fetch_delegations()
                .await
                .context("Failed to fetch delegations")?;

            let timestamp = now_in(offset);
            let mut count = 0;

            for entry in entries {
                let amount: i64 = entry.amount.trim().parse().with_context(|| {
                    format!(
                        "Invalid balance {:?} of {} with {}",
                        entry.amount, entry.delegator_address, entry.validator_address
                    )
                })?;

                let previous = tx
                    .latest_snapshot(&entry.validator_address, &entry.delegator_address)
                    .await
                    .context("Failed to load latest snapshot")?;

                let snapshot = NewDelegationSnapshot {
                    change: balance_change(previous.map(|p| p.amount), amount),
                    validator_address: entry.validator_address,
                    delegator_address: entry.delegator_address,
                    amount,
                    timestamp,
                };
                tx.create_delegation_snapshot(&snapshot)
                    .await
                    .context("Failed to create delegation snapshot")?;
                count += 1;
            }

            written.store(count, Ordering::SeqCst);
            Ok(())
        }
        .boxed()
    })
    .await;

    if let Err(e) = ctx
        .cache
        .clear_namespaces(&[namespace::HOURLY_SNAPSHOT, namespace::DELEGATOR_HISTORY])
        .await
    {
        warn!("hourly_deltas could not invalidate caches: {}", e);
    }

    result?;

    let count = written.load(Ordering::SeqCst);
    info!(
        "Completed hourly_deltas job in {:?} ({} snapshots)",
        start.elapsed(),
        count
    );
    Ok(count)
}
