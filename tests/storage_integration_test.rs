//! Integration tests for the key-value store contract
//!
//! Every backend must behave identically, so each scenario runs against the
//! in-memory store and SQLite, and against PostgreSQL when `DATABASE_URL`
//! points at one.
//!
//! Tests can be filtered by backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests
//! - By default, every available backend is tested

use shortlink::storage::{
    update_json, CachedStore, KvStore, MemoryStore, PostgresStore, SqliteStore,
};
use std::sync::Arc;
use std::time::Duration;

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.eq_ignore_ascii_case(backend),
        Err(_) => true,
    }
}

/// All configured backends, each with its own namespace
async fn backends(namespace: &str) -> Vec<(&'static str, Arc<dyn KvStore>)> {
    let mut stores: Vec<(&'static str, Arc<dyn KvStore>)> = Vec::new();

    if should_test_backend("memory") {
        stores.push(("memory", Arc::new(MemoryStore::new())));
        stores.push((
            "cached",
            Arc::new(CachedStore::new(
                Arc::new(MemoryStore::new()),
                1_000,
                Duration::from_secs(60),
            )),
        ));
    }

    if should_test_backend("sqlite") {
        // One connection so every query sees the same in-memory database
        let base = SqliteStore::connect("sqlite::memory:", 1).await.unwrap();
        base.init().await.unwrap();
        stores.push(("sqlite", Arc::new(base.namespace(namespace))));
    }

    if should_test_backend("postgres") {
        if let Some(store) = create_postgres_store(namespace).await {
            stores.push(("postgres", Arc::new(store)));
        }
    }

    stores
}

async fn create_postgres_store(namespace: &str) -> Option<PostgresStore> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    let base = PostgresStore::connect(&db_url, 5).await.ok()?;
    base.init().await.ok()?;
    // Unique per run so reruns against a shared database start clean
    let namespace = format!("{namespace}-{}", shortlink::now_millis());
    Some(base.namespace(&namespace))
}

#[tokio::test]
async fn test_put_get_delete() {
    for (name, store) in backends("put-get-delete").await {
        assert_eq!(store.get("missing").await.unwrap(), None, "{name}");

        store.put("link:abc", "one", None).await.unwrap();
        assert_eq!(store.get("link:abc").await.unwrap().as_deref(), Some("one"), "{name}");

        store.put("link:abc", "two", None).await.unwrap();
        assert_eq!(store.get("link:abc").await.unwrap().as_deref(), Some("two"), "{name}");

        assert!(store.delete("link:abc").await.unwrap(), "{name}");
        assert!(!store.delete("link:abc").await.unwrap(), "{name}");
        assert_eq!(store.get("link:abc").await.unwrap(), None, "{name}");
    }
}

#[tokio::test]
async fn test_list_is_prefix_scoped_and_sorted() {
    for (name, store) in backends("list").await {
        for key in ["click:b:2", "click:a:9", "click:a:10", "CLICK:a:1", "link:a", "click:ab:1"] {
            store.put(key, "{}", None).await.unwrap();
        }

        assert_eq!(
            store.list("click:a:").await.unwrap(),
            vec!["click:a:10", "click:a:9"],
            "{name}"
        );
        assert_eq!(store.list("link:").await.unwrap(), vec!["link:a"], "{name}");
        assert!(store.list("nothing:").await.unwrap().is_empty(), "{name}");
        assert_eq!(store.list("").await.unwrap().len(), 6, "{name}");
    }
}

#[tokio::test]
async fn test_compare_and_swap() {
    for (name, store) in backends("cas").await {
        assert!(store.compare_and_swap("k", None, "v1", None).await.unwrap(), "{name}");
        // Key now exists, so "absent" no longer matches
        assert!(!store.compare_and_swap("k", None, "v2", None).await.unwrap(), "{name}");
        assert!(!store.compare_and_swap("k", Some("stale"), "v2", None).await.unwrap(), "{name}");
        assert!(store.compare_and_swap("k", Some("v1"), "v2", None).await.unwrap(), "{name}");
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"), "{name}");
    }
}

#[tokio::test]
async fn test_concurrent_create_has_one_winner() {
    for (name, store) in backends("cas-race").await {
        let mut handles = vec![];
        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .compare_and_swap("link:same", None, &format!("writer-{i}"), None)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1, "{name}: exactly one creation should succeed");
    }
}

#[tokio::test]
async fn test_concurrent_counter_updates_are_not_lost() {
    for (name, store) in backends("counter").await {
        let mut handles = vec![];
        for _ in 0..5 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for _ in 0..4 {
                    update_json::<u64, _>(store.as_ref(), "counter", None, |n| {
                        Some(n.unwrap_or(0) + 1)
                    })
                    .await
                    .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get("counter").await.unwrap().as_deref(), Some("20"), "{name}");
    }
}

#[tokio::test]
async fn test_expired_entries_are_invisible_and_purged() {
    for (name, store) in backends("ttl").await {
        store
            .put("stats:daily:a:2024-01-01", "{}", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        store
            .compare_and_swap("click:a:1", None, "{}", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        store.put("link:a", "{}", Some(Duration::from_secs(3600))).await.unwrap();
        store.put("link:b", "{}", None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(store.get("stats:daily:a:2024-01-01").await.unwrap(), None, "{name}");
        assert!(store.list("click:").await.unwrap().is_empty(), "{name}");
        assert!(!store.delete("click:a:1").await.unwrap(), "{name}");
        // An expired key counts as absent for compare-and-swap
        assert!(
            store.compare_and_swap("stats:daily:a:2024-01-01", None, "{}", None).await.unwrap(),
            "{name}"
        );

        assert!(store.purge_expired().await.unwrap() <= 1, "{name}");
        assert_eq!(store.list("link:").await.unwrap(), vec!["link:a", "link:b"], "{name}");
    }
}

#[tokio::test]
async fn test_sqlite_namespaces_are_isolated() {
    if !should_test_backend("sqlite") {
        return;
    }

    let base = SqliteStore::connect("sqlite::memory:", 1).await.unwrap();
    base.init().await.unwrap();
    let links = base.namespace("links");
    let analytics = base.namespace("analytics");

    links.put("shared", "from-links", None).await.unwrap();
    analytics.put("shared", "from-analytics", None).await.unwrap();

    assert_eq!(links.get("shared").await.unwrap().as_deref(), Some("from-links"));
    assert_eq!(analytics.get("shared").await.unwrap().as_deref(), Some("from-analytics"));
    assert_eq!(links.list("").await.unwrap(), vec!["shared"]);

    assert!(links.delete("shared").await.unwrap());
    assert_eq!(analytics.get("shared").await.unwrap().as_deref(), Some("from-analytics"));
}

#[tokio::test]
async fn test_sqlite_persists_across_reconnects() {
    if !should_test_backend("sqlite") {
        return;
    }

    let path = std::env::temp_dir().join(format!("shortlink-kv-{}.db", std::process::id()));
    let url = format!("sqlite://{}?mode=rwc", path.display());

    {
        let store = SqliteStore::connect(&url, 2).await.unwrap();
        store.init().await.unwrap();
        store.namespace("links").put("link:keep", "{}", None).await.unwrap();
    }

    let store = SqliteStore::connect(&url, 2).await.unwrap();
    store.init().await.unwrap();
    assert_eq!(
        store.namespace("links").get("link:keep").await.unwrap().as_deref(),
        Some("{}")
    );

    drop(store);
    std::fs::remove_file(&path).ok();
}
