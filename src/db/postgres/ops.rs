use async_trait::async_trait;
use log::error;
use tokio_postgres::{Client, Row};

use crate::db::{
    models::{
        DailyAggregate, DelegationSnapshot, HistorySort, LatestSnapshot, NewDailyAggregate,
        NewDelegationSnapshot,
    },
    postgres::{PgTransaction, PostgresClient},
    SnapshotQueries, SnapshotStore,
};

// ==================== DELEGATION SNAPSHOTS ====================

async fn latest_snapshot(
    client: &Client,
    validator_address: &str,
    delegator_address: &str,
) -> anyhow::Result<Option<DelegationSnapshot>> {
    let query = r#"
        SELECT id, validator_address, delegator_address, amount, change, timestamp
        FROM tracker.delegation_snapshots
        WHERE validator_address = $1 AND delegator_address = $2
        ORDER BY timestamp DESC, id DESC
        LIMIT 1
    "#;

    let row = client
        .query_opt(query, &[&validator_address, &delegator_address])
        .await?;

    Ok(row.as_ref().map(row_to_snapshot))
}

async fn create_delegation_snapshot(
    client: &Client,
    snapshot: &NewDelegationSnapshot,
) -> anyhow::Result<i64> {
    let query = r#"
        INSERT INTO tracker.delegation_snapshots (
            validator_address, delegator_address, amount, change, timestamp
        ) VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    "#;

    let row = client
        .query_one(
            query,
            &[
                &snapshot.validator_address,
                &snapshot.delegator_address,
                &snapshot.amount,
                &snapshot.change,
                &snapshot.timestamp,
            ],
        )
        .await
        .map_err(|e| {
            error!(
                "Failed to insert snapshot for {}/{}: {:?}",
                snapshot.validator_address, snapshot.delegator_address, e
            );
            e
        })?;

    Ok(row.get("id"))
}

async fn latest_snapshots(client: &Client) -> anyhow::Result<Vec<LatestSnapshot>> {
    let query = r#"
        SELECT DISTINCT ON (validator_address, delegator_address)
            validator_address, delegator_address, amount
        FROM tracker.delegation_snapshots
        ORDER BY validator_address, delegator_address, timestamp DESC, id DESC
    "#;

    let rows = client.query(query, &[]).await?;
    let latest = rows
        .iter()
        .map(|row| LatestSnapshot {
            validator_address: row.get("validator_address"),
            delegator_address: row.get("delegator_address"),
            amount: row.get("amount"),
        })
        .collect();

    Ok(latest)
}

async fn snapshots_by_validator(
    client: &Client,
    validator_address: &str,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<DelegationSnapshot>> {
    let query = r#"
        SELECT id, validator_address, delegator_address, amount, change, timestamp
        FROM tracker.delegation_snapshots
        WHERE validator_address = $1
        ORDER BY timestamp DESC, id DESC
        LIMIT $2 OFFSET $3
    "#;

    let rows = client
        .query(query, &[&validator_address, &limit, &offset])
        .await?;
    Ok(rows.iter().map(row_to_snapshot).collect())
}

async fn count_snapshots_by_validator(
    client: &Client,
    validator_address: &str,
) -> anyhow::Result<i64> {
    let query = "SELECT COUNT(*) FROM tracker.delegation_snapshots WHERE validator_address = $1";
    let row = client.query_one(query, &[&validator_address]).await?;
    Ok(row.get(0))
}

async fn delegator_history(
    client: &Client,
    validator_address: &str,
    delegator_address: &str,
    sort: HistorySort,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<DelegationSnapshot>> {
    // Date order is the tiebreaker for every sort key
    let query = r#"
        SELECT id, validator_address, delegator_address, amount, change, timestamp
        FROM tracker.delegation_snapshots
        WHERE validator_address = $1 AND delegator_address = $2
        ORDER BY
            CASE WHEN $3::TEXT = 'amount' THEN amount END DESC,
            CASE WHEN $3::TEXT = 'change' THEN change END DESC,
            timestamp DESC, id DESC
        LIMIT $4 OFFSET $5
    "#;

    let sort_key = sort.as_str();
    let rows = client
        .query(
            query,
            &[
                &validator_address,
                &delegator_address,
                &sort_key,
                &limit,
                &offset,
            ],
        )
        .await?;
    Ok(rows.iter().map(row_to_snapshot).collect())
}

async fn count_delegator_history(
    client: &Client,
    validator_address: &str,
    delegator_address: &str,
) -> anyhow::Result<i64> {
    let query = r#"
        SELECT COUNT(*) FROM tracker.delegation_snapshots
        WHERE validator_address = $1 AND delegator_address = $2
    "#;
    let row = client
        .query_one(query, &[&validator_address, &delegator_address])
        .await?;
    Ok(row.get(0))
}

// ==================== DAILY AGGREGATES ====================

async fn create_daily_aggregate(
    client: &Client,
    aggregate: &NewDailyAggregate,
) -> anyhow::Result<i64> {
    let query = r#"
        INSERT INTO tracker.daily_aggregates (
            validator_address, delegator_address, date, total_amount
        ) VALUES ($1, $2, $3, $4)
        RETURNING id
    "#;

    let row = client
        .query_one(
            query,
            &[
                &aggregate.validator_address,
                &aggregate.delegator_address,
                &aggregate.date,
                &aggregate.total_amount,
            ],
        )
        .await
        .map_err(|e| {
            error!(
                "Failed to insert daily aggregate for {}/{}: {:?}",
                aggregate.validator_address, aggregate.delegator_address, e
            );
            e
        })?;

    Ok(row.get("id"))
}

async fn daily_aggregates_by_validator(
    client: &Client,
    validator_address: &str,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<DailyAggregate>> {
    let query = r#"
        SELECT id, validator_address, delegator_address, date, total_amount
        FROM tracker.daily_aggregates
        WHERE validator_address = $1
        ORDER BY date DESC, id DESC
        LIMIT $2 OFFSET $3
    "#;

    let rows = client
        .query(query, &[&validator_address, &limit, &offset])
        .await?;
    let aggregates = rows
        .iter()
        .map(|row| DailyAggregate {
            id: row.get("id"),
            validator_address: row.get("validator_address"),
            delegator_address: row.get("delegator_address"),
            date: row.get("date"),
            total_amount: row.get("total_amount"),
        })
        .collect();

    Ok(aggregates)
}

async fn count_daily_aggregates_by_validator(
    client: &Client,
    validator_address: &str,
) -> anyhow::Result<i64> {
    let query = "SELECT COUNT(*) FROM tracker.daily_aggregates WHERE validator_address = $1";
    let row = client.query_one(query, &[&validator_address]).await?;
    Ok(row.get(0))
}

// ==================== TRAIT IMPLS ====================

#[async_trait]
impl SnapshotStore for PgTransaction {
    async fn latest_snapshot(
        &self,
        validator_address: &str,
        delegator_address: &str,
    ) -> anyhow::Result<Option<DelegationSnapshot>> {
        latest_snapshot(self.client()?, validator_address, delegator_address).await
    }

    async fn create_delegation_snapshot(
        &self,
        snapshot: &NewDelegationSnapshot,
    ) -> anyhow::Result<i64> {
        create_delegation_snapshot(self.client()?, snapshot).await
    }

    async fn latest_snapshots(&self) -> anyhow::Result<Vec<LatestSnapshot>> {
        latest_snapshots(self.client()?).await
    }

    async fn create_daily_aggregate(&self, aggregate: &NewDailyAggregate) -> anyhow::Result<i64> {
        create_daily_aggregate(self.client()?, aggregate).await
    }
}

#[async_trait]
impl SnapshotQueries for PostgresClient {
    async fn snapshots_by_validator(
        &self,
        validator_address: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<DelegationSnapshot>> {
        let client = self.pool.get().await?;
        snapshots_by_validator(&client, validator_address, limit, offset).await
    }

    async fn count_snapshots_by_validator(&self, validator_address: &str) -> anyhow::Result<i64> {
        let client = self.pool.get().await?;
        count_snapshots_by_validator(&client, validator_address).await
    }

    async fn daily_aggregates_by_validator(
        &self,
        validator_address: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<DailyAggregate>> {
        let client = self.pool.get().await?;
        daily_aggregates_by_validator(&client, validator_address, limit, offset).await
    }

    async fn count_daily_aggregates_by_validator(
        &self,
        validator_address: &str,
    ) -> anyhow::Result<i64> {
        let client = self.pool.get().await?;
        count_daily_aggregates_by_validator(&client, validator_address).await
    }

    async fn delegator_history(
        &self,
        validator_address: &str,
        delegator_address: &str,
        sort: HistorySort,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<DelegationSnapshot>> {
        let client = self.pool.get().await?;
        delegator_history(
            &client,
            validator_address,
            delegator_address,
            sort,
            limit,
            offset,
        )
        .await
    }

    async fn count_delegator_history(
        &self,
        validator_address: &str,
        delegator_address: &str,
    ) -> anyhow::Result<i64> {
        let client = self.pool.get().await?;
        count_delegator_history(&client, validator_address, delegator_address).await
    }
}

// ==================== HELPER FUNCTIONS ====================

fn row_to_snapshot(row: &Row) -> DelegationSnapshot {
    DelegationSnapshot {
        id: row.get("id"),
        validator_address: row.get("validator_address"),
        delegator_address: row.get("delegator_address"),
        amount: row.get("amount"),
        change: row.get("change"),
        timestamp: row.get("timestamp"),
    }
}
