use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::time::Duration;

use crate::now_millis;
use crate::storage::trait_def::expiry_millis;
use crate::storage::KvStore;

/// SQLite-backed store; every namespace shares one `kv_entries` table
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    namespace: String,
}

impl SqliteStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool,
            namespace: String::new(),
        })
    }

    /// A handle over the same pool scoped to another namespace
    pub fn namespace(&self, namespace: &str) -> Self {
        Self {
            pool: self.pool.clone(),
            namespace: namespace.to_string(),
        }
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                expires_at INTEGER,
                PRIMARY KEY (namespace, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_kv_expires_at ON kv_entries(expires_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            r#"
            SELECT value FROM kv_entries
            WHERE namespace = ? AND key = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(self.namespace.as_str())
        .bind(key)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (namespace, key, value, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(namespace, key) DO UPDATE
            SET value = excluded.value, expires_at = excluded.expires_at
            "#,
        )
        .bind(self.namespace.as_str())
        .bind(key)
        .bind(value)
        .bind(expiry_millis(ttl))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM kv_entries
            WHERE namespace = ? AND key = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(self.namespace.as_str())
        .bind(key)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        // substr() keeps the match case-sensitive, unlike LIKE
        let keys = sqlx::query_scalar::<_, String>(
            r#"
            SELECT key FROM kv_entries
            WHERE namespace = ? AND substr(key, 1, length(?)) = ?
              AND (expires_at IS NULL OR expires_at > ?)
            ORDER BY key
            "#,
        )
        .bind(self.namespace.as_str())
        .bind(prefix)
        .bind(prefix)
        .bind(now_millis())
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let now = now_millis();
        let result = match expected {
            Some(current) => {
                sqlx::query(
                    r#"
                    UPDATE kv_entries SET value = ?, expires_at = ?
                    WHERE namespace = ? AND key = ? AND value = ?
                      AND (expires_at IS NULL OR expires_at > ?)
                    "#,
                )
                .bind(value)
                .bind(expiry_millis(ttl))
                .bind(self.namespace.as_str())
                .bind(key)
                .bind(current)
                .bind(now)
                .execute(&self.pool)
                .await?
            }
            None => {
                // An expired row still occupies the primary key
                sqlx::query(
                    r#"
                    DELETE FROM kv_entries
                    WHERE namespace = ? AND key = ? AND expires_at IS NOT NULL AND expires_at <= ?
                    "#,
                )
                .bind(self.namespace.as_str())
                .bind(key)
                .bind(now)
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    INSERT INTO kv_entries (namespace, key, value, expires_at)
                    VALUES (?, ?, ?, ?)
                    ON CONFLICT(namespace, key) DO NOTHING
                    "#,
                )
                .bind(self.namespace.as_str())
                .bind(key)
                .bind(value)
                .bind(expiry_millis(ttl))
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM kv_entries
            WHERE namespace = ? AND expires_at IS NOT NULL AND expires_at <= ?
            "#,
        )
        .bind(self.namespace.as_str())
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
