//! Read cache: a key-value backend plus the cache-aside wrapper the query
//! service reads through and the jobs invalidate.

mod aside;
mod error;
mod store;

pub use aside::CacheAside;
pub use error::CacheError;
pub use store::{CacheStore, MokaStore};

#[cfg(test)]
pub(crate) use store::MockCacheStore;

/// Cache namespaces. Every key starts with `"{namespace}:"`.
pub mod namespace {
    pub const HOURLY_SNAPSHOT: &str = "validator_hourly_snapshot";
    pub const DAILY_SNAPSHOT: &str = "validator_daily_snapshot";
    pub const DELEGATOR_HISTORY: &str = "validator_delegator_history";
}
