use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use moka::{future::Cache, Expiry};

use super::CacheError;
use crate::config::CacheSettings;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
/// Key-value backend with per-entry TTL.
pub trait CacheStore: Send + Sync {
    /// `Ok(None)` on a miss or an expired entry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;

    /// Removes every entry whose key starts with `prefix`.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct CachedValue {
    bytes: Arc<[u8]>,
    ttl: Duration,
}

struct TtlExpiry;

impl Expiry<String, CachedValue> for TtlExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache backend on top of moka.
///
/// Prefix deletes are registered as invalidation predicates: matching
/// entries stop being returned immediately and are evicted in the
/// background. Entries inserted afterwards are not affected.
#[derive(Clone)]
pub struct MokaStore {
    cache: Cache<String, CachedValue>,
}

impl MokaStore {
    pub fn new(settings: &CacheSettings) -> Self {
        let cache = Cache::builder()
            .max_capacity(settings.max_capacity)
            .expire_after(TtlExpiry)
            .support_invalidation_closures()
            .build();

        Self { cache }
    }
}

#[async_trait]
impl CacheStore for MokaStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.cache.get(key).await.map(|value| value.bytes.to_vec()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let value = CachedValue {
            bytes: Arc::from(value),
            ttl,
        };
        self.cache.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        for key in keys {
            self.cache.invalidate(key).await;
        }
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let prefix = prefix.to_string();
        self.cache
            .invalidate_entries_if(move |key, _| key.starts_with(&prefix))
            .map(|_| ())
            .map_err(|e| CacheError::Backend(e.to_string()))
    }
}
