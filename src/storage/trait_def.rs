use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// String-keyed store with optional per-key expiry and prefix listing.
///
/// Each handle is scoped to one logical namespace; keys never leak
/// between namespaces. Expired entries are invisible to every operation.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Remove a key, returning whether a live entry existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Keys starting with `prefix`, in lexicographic order
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Write `value` only if the current value equals `expected`
    /// (`None` meaning the key is absent). Returns whether the write happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool>;

    /// Physically drop expired entries, returning how many were removed
    async fn purge_expired(&self) -> Result<u64>;
}

pub async fn get_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .with_context(|| format!("corrupt JSON stored under '{key}'"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

pub async fn put_json<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw, ttl).await
}

/// Upper bound on compare-and-swap rounds before an update is abandoned
pub const MAX_CAS_ATTEMPTS: u32 = 16;

/// Read-modify-write a JSON value without losing concurrent updates.
///
/// `apply` receives the current value (or `None` when absent) and returns the
/// replacement, or `None` to leave the key alone. The write only lands if the
/// stored value is still the one `apply` saw; otherwise the whole round is
/// retried with a fresh read. Returns the value that was written.
pub async fn update_json<T, F>(
    store: &dyn KvStore,
    key: &str,
    ttl: Option<Duration>,
    mut apply: F,
) -> Result<Option<T>>
where
    T: Serialize + DeserializeOwned + Send,
    F: FnMut(Option<T>) -> Option<T> + Send,
{
    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let current = store.get(key).await?;
        let parsed = match current.as_deref() {
            Some(raw) => Some(
                serde_json::from_str(raw)
                    .with_context(|| format!("corrupt JSON stored under '{key}'"))?,
            ),
            None => None,
        };

        let Some(next) = apply(parsed) else {
            return Ok(None);
        };
        let raw = serde_json::to_string(&next)?;

        if store
            .compare_and_swap(key, current.as_deref(), &raw, ttl)
            .await?
        {
            return Ok(Some(next));
        }
        tracing::debug!(key, attempt, "concurrent write detected, retrying");
    }

    bail!("gave up updating '{key}' after {MAX_CAS_ATTEMPTS} conflicting writes")
}

/// Expiry instant in epoch milliseconds for a TTL starting now
pub(crate) fn expiry_millis(ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|ttl| crate::now_millis().saturating_add(ttl.as_millis() as i64))
}
