use anyhow::Result;
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::time::{Duration, Instant};

use crate::storage::KvStore;

struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|at| at > Instant::now())
    }
}

/// In-process store backed by a `DashMap`
///
/// Per-key operations take the shard lock, so `compare_and_swap` is atomic.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value().is_live()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.entries
            .insert(key.to_string(), StoredValue::new(value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, stored)| stored.is_live()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && entry.value().is_live())
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied
                    .get()
                    .is_live()
                    .then(|| occupied.get().value.as_str());
                if current != expected {
                    return Ok(false);
                }
                occupied.insert(StoredValue::new(value, ttl));
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                if expected.is_some() {
                    return Ok(false);
                }
                vacant.insert(StoredValue::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn purge_expired(&self) -> Result<u64> {
        let before = self.entries.len();
        self.entries.retain(|_, stored| stored.is_live());
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn compare_and_swap_detects_concurrent_writes() {
        let store = MemoryStore::new();

        assert!(store.compare_and_swap("k", None, "1", None).await.unwrap());
        // A second "create" loses against the first
        assert!(!store.compare_and_swap("k", None, "1", None).await.unwrap());
        // Stale expectation loses
        assert!(!store.compare_and_swap("k", Some("0"), "2", None).await.unwrap());
        assert!(store.compare_and_swap("k", Some("1"), "2", None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn expired_entries_are_invisible() {
        let store = MemoryStore::new();
        store
            .put("short", "v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        store.put("long", "v", None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.list("").await.unwrap(), vec!["long".to_string()]);
        assert!(!store.delete("short").await.unwrap());
        // An expired key counts as absent for compare-and-swap
        assert!(store.compare_and_swap("short", None, "new", None).await.unwrap());
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn purge_drops_expired_entries() {
        let store = MemoryStore::new();
        store
            .put("a", "v", Some(Duration::from_millis(5)))
            .await
            .unwrap();
        store.put("b", "v", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }
}
