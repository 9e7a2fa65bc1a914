//! In-memory transactional store for unit tests.
//!
//! Transactions stage their writes and publish them on commit, so reads inside
//! a transaction see committed rows plus their own writes. Counters and
//! failure switches let tests observe retries and rollbacks.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;

use super::{
    models::{
        DailyAggregate, DelegationSnapshot, HistorySort, LatestSnapshot, NewDailyAggregate,
        NewDelegationSnapshot,
    },
    IsolationLevel, SnapshotQueries, SnapshotStore, Transaction, TransactionManager,
};

#[derive(Debug, Default)]
struct Tables {
    snapshots: Vec<DelegationSnapshot>,
    aggregates: Vec<DailyAggregate>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
struct Switches {
    begin: AtomicBool,
    rollback: AtomicBool,
    create_snapshot: AtomicBool,
    latest_snapshots: AtomicBool,
    page_queries: AtomicBool,
    count_queries: AtomicBool,
}

#[derive(Debug, Default)]
struct Counters {
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    aborted: AtomicUsize,
    queries: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TxStats {
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    /// Dropped without commit or rollback
    pub aborted: usize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    switches: Arc<Switches>,
    counters: Arc<Counters>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_begin(&self, fail: bool) {
        self.switches.begin.store(fail, Ordering::SeqCst);
    }

    pub fn fail_rollback(&self, fail: bool) {
        self.switches.rollback.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create_snapshot(&self, fail: bool) {
        self.switches.create_snapshot.store(fail, Ordering::SeqCst);
    }

    pub fn fail_latest_snapshots(&self, fail: bool) {
        self.switches.latest_snapshots.store(fail, Ordering::SeqCst);
    }

    pub fn fail_page_queries(&self, fail: bool) {
        self.switches.page_queries.store(fail, Ordering::SeqCst);
    }

    pub fn fail_count_queries(&self, fail: bool) {
        self.switches.count_queries.store(fail, Ordering::SeqCst);
    }

    pub fn tx_stats(&self) -> TxStats {
        TxStats {
            begins: self.counters.begins.load(Ordering::SeqCst),
            commits: self.counters.commits.load(Ordering::SeqCst),
            rollbacks: self.counters.rollbacks.load(Ordering::SeqCst),
            aborted: self.counters.aborted.load(Ordering::SeqCst),
        }
    }

    /// Read-side repository calls made so far.
    pub fn query_calls(&self) -> usize {
        self.counters.queries.load(Ordering::SeqCst)
    }

    /// Committed snapshots in insertion order.
    pub fn snapshots(&self) -> Vec<DelegationSnapshot> {
        self.lock().snapshots.clone()
    }

    /// Committed aggregates in insertion order.
    pub fn aggregates(&self) -> Vec<DailyAggregate> {
        self.lock().aggregates.clone()
    }

    /// Commits a snapshot directly, bypassing transactions.
    pub fn seed_snapshot(&self, snapshot: NewDelegationSnapshot) -> i64 {
        let mut tables = self.lock();
        let row = to_row(&mut tables, &snapshot);
        let id = row.id;
        tables.snapshots.push(row);
        id
    }

    /// Commits an aggregate directly, bypassing transactions.
    pub fn seed_aggregate(&self, aggregate: NewDailyAggregate) -> i64 {
        let mut tables = self.lock();
        let id = tables.next_id();
        tables.aggregates.push(DailyAggregate {
            id,
            validator_address: aggregate.validator_address,
            delegator_address: aggregate.delegator_address,
            date: aggregate.date,
            total_amount: aggregate.total_amount,
        });
        id
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_query(&self, switch: &AtomicBool, what: &str) -> anyhow::Result<()> {
        self.counters.queries.fetch_add(1, Ordering::SeqCst);
        if switch.load(Ordering::SeqCst) {
            bail!("injected {} failure", what);
        }
        Ok(())
    }
}

fn to_row(tables: &mut Tables, snapshot: &NewDelegationSnapshot) -> DelegationSnapshot {
    DelegationSnapshot {
        id: tables.next_id(),
        validator_address: snapshot.validator_address.clone(),
        delegator_address: snapshot.delegator_address.clone(),
        amount: snapshot.amount,
        change: snapshot.change,
        timestamp: snapshot.timestamp.with_timezone(&Utc),
    }
}

fn newest_first(a: &DelegationSnapshot, b: &DelegationSnapshot) -> std::cmp::Ordering {
    b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id))
}

fn page<T>(rows: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    rows.into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[derive(Debug)]
pub(crate) struct MemoryTx {
    store: MemoryStore,
    staged: Mutex<Tables>,
    finished: bool,
}

impl MemoryTx {
    fn staged(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.staged.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn visible_snapshots(&self) -> Vec<DelegationSnapshot> {
        let mut rows = self.store.lock().snapshots.clone();
        rows.extend(self.staged().snapshots.iter().cloned());
        rows
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            self.store.counters.aborted.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl SnapshotStore for MemoryTx {
    async fn latest_snapshot(
        &self,
        validator_address: &str,
        delegator_address: &str,
    ) -> anyhow::Result<Option<DelegationSnapshot>> {
        let mut rows: Vec<_> = self
            .visible_snapshots()
            .into_iter()
            .filter(|s| {
                s.validator_address == validator_address && s.delegator_address == delegator_address
            })
            .collect();
        rows.sort_by(newest_first);
        Ok(rows.into_iter().next())
    }

    async fn create_delegation_snapshot(
        &self,
        snapshot: &NewDelegationSnapshot,
    ) -> anyhow::Result<i64> {
        if self.store.switches.create_snapshot.load(Ordering::SeqCst) {
            bail!("injected create_delegation_snapshot failure");
        }
        // Ids come from the shared sequence, like BIGSERIAL
        let row = to_row(&mut self.store.lock(), snapshot);
        let id = row.id;
        self.staged().snapshots.push(row);
        Ok(id)
    }

    async fn latest_snapshots(&self) -> anyhow::Result<Vec<LatestSnapshot>> {
        if self.store.switches.latest_snapshots.load(Ordering::SeqCst) {
            bail!("injected latest_snapshots failure");
        }
        let mut rows = self.visible_snapshots();
        rows.sort_by(|a, b| {
            (&a.validator_address, &a.delegator_address)
                .cmp(&(&b.validator_address, &b.delegator_address))
                .then_with(|| newest_first(a, b))
        });
        rows.dedup_by(|b, a| {
            a.validator_address == b.validator_address && a.delegator_address == b.delegator_address
        });
        Ok(rows
            .into_iter()
            .map(|s| LatestSnapshot {
                validator_address: s.validator_address,
                delegator_address: s.delegator_address,
                amount: s.amount,
            })
            .collect())
    }

    async fn create_daily_aggregate(&self, aggregate: &NewDailyAggregate) -> anyhow::Result<i64> {
        let id = self.store.lock().next_id();
        self.staged().aggregates.push(DailyAggregate {
            id,
            validator_address: aggregate.validator_address.clone(),
            delegator_address: aggregate.delegator_address.clone(),
            date: aggregate.date,
            total_amount: aggregate.total_amount,
        });
        Ok(id)
    }
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn commit(mut self) -> anyhow::Result<()> {
        self.finished = true;
        let staged = std::mem::take(&mut *self.staged());
        let mut tables = self.store.lock();
        tables.snapshots.extend(staged.snapshots);
        tables.aggregates.extend(staged.aggregates);
        self.store.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(mut self) -> anyhow::Result<()> {
        self.finished = true;
        self.store.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        if self.store.switches.rollback.load(Ordering::SeqCst) {
            return Err(anyhow!("injected rollback failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionManager for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self, _isolation: IsolationLevel) -> anyhow::Result<MemoryTx> {
        self.counters.begins.fetch_add(1, Ordering::SeqCst);
        if self.switches.begin.load(Ordering::SeqCst) {
            bail!("injected begin failure");
        }
        Ok(MemoryTx {
            store: self.clone(),
            staged: Mutex::new(Tables::default()),
            finished: false,
        })
    }
}

#[async_trait]
impl SnapshotQueries for MemoryStore {
    async fn snapshots_by_validator(
        &self,
        validator_address: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<DelegationSnapshot>> {
        self.record_query(&self.switches.page_queries, "snapshots_by_validator")?;
        let mut rows: Vec<_> = self
            .snapshots()
            .into_iter()
            .filter(|s| s.validator_address == validator_address)
            .collect();
        rows.sort_by(newest_first);
        Ok(page(rows, limit, offset))
    }

    async fn count_snapshots_by_validator(&self, validator_address: &str) -> anyhow::Result<i64> {
        self.record_query(&self.switches.count_queries, "count_snapshots_by_validator")?;
        let count = self
            .lock()
            .snapshots
            .iter()
            .filter(|s| s.validator_address == validator_address)
            .count();
        Ok(count as i64)
    }

    async fn daily_aggregates_by_validator(
        &self,
        validator_address: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<DailyAggregate>> {
        self.record_query(&self.switches.page_queries, "daily_aggregates_by_validator")?;
        let mut rows: Vec<_> = self
            .aggregates()
            .into_iter()
            .filter(|a| a.validator_address == validator_address)
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(page(rows, limit, offset))
    }

    async fn count_daily_aggregates_by_validator(
        &self,
        validator_address: &str,
    ) -> anyhow::Result<i64> {
        self.record_query(&self.switches.count_queries, "count_daily_aggregates_by_validator")?;
        let count = self
            .lock()
            .aggregates
            .iter()
            .filter(|a| a.validator_address == validator_address)
            .count();
        Ok(count as i64)
    }

    async fn delegator_history(
        &self,
        validator_address: &str,
        delegator_address: &str,
        sort: HistorySort,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<DelegationSnapshot>> {
        self.record_query(&self.switches.page_queries, "delegator_history")?;
        let mut rows: Vec<_> = self
            .snapshots()
            .into_iter()
            .filter(|s| {
                s.validator_address == validator_address && s.delegator_address == delegator_address
            })
            .collect();
        rows.sort_by(|a, b| {
            let primary = match sort {
                HistorySort::Date => std::cmp::Ordering::Equal,
                HistorySort::Amount => b.amount.cmp(&a.amount),
                HistorySort::Change => b.change.cmp(&a.change),
            };
            primary.then_with(|| newest_first(a, b))
        });
        Ok(page(rows, limit, offset))
    }

    async fn count_delegator_history(
        &self,
        validator_address: &str,
        delegator_address: &str,
    ) -> anyhow::Result<i64> {
        self.record_query(&self.switches.count_queries, "count_delegator_history")?;
        let count = self
            .lock()
            .snapshots
            .iter()
            .filter(|s| {
                s.validator_address == validator_address && s.delegator_address == delegator_address
            })
            .count();
        Ok(count as i64)
    }
}
