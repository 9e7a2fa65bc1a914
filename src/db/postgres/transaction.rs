use anyhow::{bail, Context};
use async_trait::async_trait;
use deadpool_postgres::Object;
use log::warn;
use tokio_postgres::Client;

use crate::db::{IsolationLevel, Transaction};

/// Transaction on a pooled connection, driven with explicit
/// `BEGIN` / `COMMIT` / `ROLLBACK` so it can own its connection.
///
/// A connection whose transaction did not finish cleanly (dropped by a
/// cancelled job, or a failed `COMMIT`/`ROLLBACK`) is detached from the pool
/// and closed, which makes the server abort whatever is still open on it.
pub struct PgTransaction {
    conn: Option<Object>,
}

impl PgTransaction {
    pub(super) async fn begin(conn: Object, isolation: IsolationLevel) -> anyhow::Result<Self> {
        conn.batch_execute(&format!("BEGIN ISOLATION LEVEL {}", isolation.as_sql()))
            .await
            .context("Failed to begin transaction")?;
        Ok(Self { conn: Some(conn) })
    }

    pub(super) fn client(&self) -> anyhow::Result<&Client> {
        match &self.conn {
            Some(conn) => {
                let client: &Client = conn;
                Ok(client)
            },
            None => bail!("transaction already finished"),
        }
    }

    async fn finish(mut self, statement: &str) -> anyhow::Result<()> {
        let Some(conn) = self.conn.take() else {
            bail!("transaction already finished");
        };

        match conn.batch_execute(statement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                drop(Object::take(conn));
                Err(e).with_context(|| format!("Failed to {} transaction", statement))
            },
        }
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self) -> anyhow::Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self) -> anyhow::Result<()> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!("Transaction dropped while open, closing its connection");
            drop(Object::take(conn));
        }
    }
}
