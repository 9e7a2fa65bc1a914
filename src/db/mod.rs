use std::sync::Arc;

use crate::config::PostgresSettings;

#[cfg(test)]
pub(crate) mod memory;
pub mod models;
pub mod postgres;
mod repository;
mod transaction;

pub use postgres::{PgTransaction, PostgresClient};
pub use repository::{SnapshotQueries, SnapshotStore};
pub use transaction::{
    execute_with_retry, IsolationLevel, RetryPolicy, Transaction, TransactionManager, TxError,
};

/// Database handle shared by the jobs and the query service.
///
/// PostgreSQL holds the whole delegation history; the client is both the
/// write-side [`TransactionManager`] and the read-side [`SnapshotQueries`].
#[derive(Clone)]
pub struct Database {
    pub postgres: Arc<PostgresClient>,
}

impl Database {
    pub async fn new(settings: PostgresSettings) -> anyhow::Result<Self> {
        let postgres = PostgresClient::new(settings).await?;

        postgres.migrate().await?;
        postgres.health_check().await?;

        Ok(Self {
            postgres: Arc::new(postgres),
        })
    }
}
