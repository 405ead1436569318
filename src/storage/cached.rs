use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::storage::KvStore;

/// Read-through cache in front of another store
///
/// Writes go straight to the inner store and invalidate the cached entry
/// before returning, so a `get` issued after a write always sees it.
/// Absent keys are cached too; the short-code uniqueness loop relies on
/// the invalidation above to observe a freshly created link.
pub struct CachedStore {
    /// Underlying storage implementation
    inner: Arc<dyn KvStore>,
    /// Read cache for lookups (Moka cache)
    read_cache: Cache<String, Option<String>>,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn KvStore>, max_entries: u64, ttl: Duration) -> Self {
        let read_cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { inner, read_cache }
    }

    async fn invalidate(&self, key: &str) {
        self.read_cache.invalidate(key).await;
    }
}

#[async_trait]
impl KvStore for CachedStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(cached) = self.read_cache.get(key).await {
            return Ok(cached);
        }

        let value = self.inner.get(key).await?;
        self.read_cache
            .insert(key.to_string(), value.clone())
            .await;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let result = self.inner.put(key, value, ttl).await;
        self.invalidate(key).await;
        result
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let result = self.inner.delete(key).await;
        self.invalidate(key).await;
        result
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list(prefix).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let result = self.inner.compare_and_swap(key, expected, value, ttl).await;
        self.invalidate(key).await;
        result
    }

    async fn purge_expired(&self) -> Result<u64> {
        let purged = self.inner.purge_expired().await?;
        if purged > 0 {
            self.read_cache.invalidate_all();
        }
        Ok(purged)
    }
}
