//! Storage seams for delegation history.
//!
//! [`SnapshotStore`] is the write side and is always used through a
//! transaction handed out by a [`TransactionManager`](super::TransactionManager).
//! [`SnapshotQueries`] is the pooled read side behind the query service.

use async_trait::async_trait;

use crate::db::models::{
    DailyAggregate, DelegationSnapshot, HistorySort, LatestSnapshot, NewDailyAggregate,
    NewDelegationSnapshot,
};

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Newest snapshot of the pair, `None` if the delegator was never seen.
    async fn latest_snapshot(
        &self,
        validator_address: &str,
        delegator_address: &str,
    ) -> anyhow::Result<Option<DelegationSnapshot>>;

    async fn create_delegation_snapshot(
        &self,
        snapshot: &NewDelegationSnapshot,
    ) -> anyhow::Result<i64>;

    /// Newest snapshot of every (validator, delegator) pair in the table.
    async fn latest_snapshots(&self) -> anyhow::Result<Vec<LatestSnapshot>>;

    async fn create_daily_aggregate(&self, aggregate: &NewDailyAggregate) -> anyhow::Result<i64>;
}

#[async_trait]
pub trait SnapshotQueries: Send + Sync {
    async fn snapshots_by_validator(
        &self,
        validator_address: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<DelegationSnapshot>>;

    async fn count_snapshots_by_validator(&self, validator_address: &str) -> anyhow::Result<i64>;

    async fn daily_aggregates_by_validator(
        &self,
        validator_address: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<DailyAggregate>>;

    async fn count_daily_aggregates_by_validator(
        &self,
        validator_address: &str,
    ) -> anyhow::Result<i64>;

    async fn delegator_history(
        &self,
        validator_address: &str,
        delegator_address: &str,
        sort: HistorySort,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<DelegationSnapshot>>;

    async fn count_delegator_history(
        &self,
        validator_address: &str,
        delegator_address: &str,
    ) -> anyhow::Result<i64>;
}
