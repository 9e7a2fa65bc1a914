use std::{future::Future, sync::Arc, time::Duration};

use log::{debug, warn};
use serde::{de::DeserializeOwned, Serialize};

use super::{CacheError, CacheStore};

/// Cache-aside wrapper around a [`CacheStore`].
///
/// Values are stored as JSON under `"{namespace}:{params as JSON}"`. The
/// cache is an optimisation only: backend failures degrade to computing the
/// value, they never fail a read.
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Deterministic key of a request. Struct fields serialize in
    /// declaration order, so equal params always give equal keys.
    pub fn build_key<P>(namespace: &str, params: &P) -> Result<String, CacheError>
    where
        P: Serialize + ?Sized,
    {
        let encoded = serde_json::to_string(params)?;
        Ok(format!("{}:{}", namespace, encoded))
    }

    fn prefix(namespace: &str) -> String {
        format!("{}:", namespace)
    }

    /// Returns the cached value of `params` under `namespace`, or runs
    /// `compute` and caches its result. A failed computation is returned
    /// as is and leaves the cache untouched.
    pub async fn get_or_set<T, P, F, Fut, E>(
        &self,
        namespace: &str,
        params: &P,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        P: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = match Self::build_key(namespace, params) {
            Ok(key) => key,
            Err(e) => {
                warn!("Bypassing cache for {}: {}", namespace, e);
                return compute().await;
            },
        };

        match self.store.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    debug!("Cache hit {}", key);
                    return Ok(value);
                },
                Err(e) => warn!("Discarding undecodable cache entry {}: {}", key, e),
            },
            Ok(None) => debug!("Cache miss {}", key),
            Err(e) => warn!("Cache read failed for {}: {}", key, e),
        }

        let value = compute().await?;

        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                if let Err(e) = self.store.set(&key, bytes, self.ttl).await {
                    warn!("Cache write failed for {}: {}", key, e);
                }
            },
            Err(e) => warn!("Failed to encode cache entry {}: {}", key, e),
        }

        Ok(value)
    }

    /// Drops every entry of the given namespaces. All namespaces are
    /// attempted; the last failure is returned.
    pub async fn clear_namespaces(&self, namespaces: &[&str]) -> Result<(), CacheError> {
        let mut result = Ok(());
        for namespace in namespaces {
            match self.store.delete_by_prefix(&Self::prefix(namespace)).await {
                Ok(()) => debug!("Cleared cache namespace {}", namespace),
                Err(e) => {
                    warn!("Failed to clear cache namespace {}: {}", namespace, e);
                    result = Err(e);
                },
            }
        }
        result
    }

    pub async fn clear_keys(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        self.store.delete(keys).await
    }
}
