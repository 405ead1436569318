pub mod cached;
pub mod keys;
pub mod memory;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use cached::CachedStore;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use trait_def::{get_json, put_json, update_json, KvStore, MAX_CAS_ATTEMPTS};

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};

use crate::config::{StorageBackend, StorageConfig};

/// The three logical namespaces the service works with
#[derive(Clone)]
pub struct Stores {
    pub links: Arc<dyn KvStore>,
    pub analytics: Arc<dyn KvStore>,
    pub admin: Arc<dyn KvStore>,
}

impl Stores {
    pub fn memory() -> Self {
        Self {
            links: Arc::new(MemoryStore::new()),
            analytics: Arc::new(MemoryStore::new()),
            admin: Arc::new(MemoryStore::new()),
        }
    }

    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let stores = match config.backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage; data is lost on restart");
                Self::memory()
            }
            StorageBackend::Sqlite => {
                info!("Using SQLite storage: {}", config.url);
                let base = SqliteStore::connect(&config.url, config.max_connections).await?;
                base.init().await?;
                Self {
                    links: Arc::new(base.namespace("links")),
                    analytics: Arc::new(base.namespace("analytics")),
                    admin: Arc::new(base.namespace("admin")),
                }
            }
            StorageBackend::Postgres => {
                info!("Using PostgreSQL storage: {}", config.url);
                let base = PostgresStore::connect(&config.url, config.max_connections).await?;
                base.init().await?;
                Self {
                    links: Arc::new(base.namespace("links")),
                    analytics: Arc::new(base.namespace("analytics")),
                    admin: Arc::new(base.namespace("admin")),
                }
            }
        };

        Ok(stores.with_link_cache(config.link_cache_max_entries, config.link_cache_ttl_secs))
    }

    /// Put a read cache in front of the links namespace
    pub fn with_link_cache(mut self, max_entries: u64, ttl_secs: u64) -> Self {
        if max_entries > 0 && ttl_secs > 0 {
            self.links = Arc::new(CachedStore::new(
                self.links,
                max_entries,
                Duration::from_secs(ttl_secs),
            ));
        }
        self
    }
}

/// Periodically drop expired analytics rows so tables do not grow unbounded
pub fn spawn_expiry_sweeper(
    store: Arc<dyn KvStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!("Purged {} expired entries", purged),
                Err(e) => warn!("Failed to purge expired entries: {}", e),
            }
        }
    })
}
