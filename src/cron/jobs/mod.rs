//! Write-side jobs. Each run is one retrying transaction followed by
//! invalidation of the cache namespaces the job writes to.

use std::sync::Arc;

use chrono::FixedOffset;
use tokio::time::Instant;

use crate::{
    cache::CacheAside,
    chain::ChainReader,
    config::JobSettings,
    db::{RetryPolicy, TransactionManager},
};

pub mod daily_aggregates;
pub mod hourly_deltas;

/// Everything a job run needs. Cheap to clone.
pub struct JobContext<M> {
    pub manager: Arc<M>,
    pub reader: Arc<dyn ChainReader>,
    pub cache: CacheAside,
    pub settings: JobSettings,
    /// Reference timezone for snapshot timestamps and aggregate dates
    pub offset: FixedOffset,
}

impl<M> Clone for JobContext<M> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            reader: self.reader.clone(),
            cache: self.cache.clone(),
            settings: self.settings.clone(),
            offset: self.offset,
        }
    }
}

impl<M: TransactionManager> JobContext<M> {
    pub fn new(
        manager: Arc<M>,
        reader: Arc<dyn ChainReader>,
        cache: CacheAside,
        settings: JobSettings,
    ) -> Self {
        let offset = settings.reference_offset();
        Self {
            manager,
            reader,
            cache,
            settings,
            offset,
        }
    }

    pub fn retry_policy(&self, deadline: Instant) -> RetryPolicy {
        RetryPolicy::new(self.settings.retry_count, self.settings.retry_delay()).with_deadline(deadline)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use super::*;
    use crate::{
        cache::MokaStore,
        chain::DelegationEntry,
        config::CacheSettings,
        db::memory::MemoryStore,
    };

    pub const VALIDATOR: &str = "cosmosvaloper1abc";

    pub fn entry(delegator: &str, amount: &str) -> DelegationEntry {
        DelegationEntry {
            validator_address: VALIDATOR.to_string(),
            delegator_address: delegator.to_string(),
            denom: "uatom".to_string(),
            amount: amount.to_string(),
        }
    }

    pub fn settings() -> JobSettings {
        JobSettings {
            retry_delay_ms: 20,
            ..JobSettings::default()
        }
    }

    pub fn context(
        store: &MemoryStore,
        reader: impl ChainReader + 'static,
        settings: JobSettings,
    ) -> JobContext<MemoryStore> {
        let cache = CacheAside::new(
            Arc::new(MokaStore::new(&CacheSettings::default())),
            Duration::from_secs(60),
        );
        JobContext::new(Arc::new(store.clone()), Arc::new(reader), cache, settings)
    }

    pub fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    /// Caches a probe value under `namespace`.
    pub async fn cache_entry(cache: &CacheAside, namespace: &str) {
        let _: i64 = cache
            .get_or_set(namespace, &"probe", || async { Ok::<_, anyhow::Error>(1) })
            .await
            .unwrap();
    }

    /// Whether the probe is still served from the cache.
    pub async fn is_cached(cache: &CacheAside, namespace: &str) -> bool {
        let value: i64 = cache
            .get_or_set(namespace, &"probe", || async { Ok::<_, anyhow::Error>(2) })
            .await
            .unwrap();
        value == 1
    }
}
