use anyhow::{bail, Context};
use base64::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    /// Public origin used when building `shortUrl` values
    pub base_url: String,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub analytics: AnalyticsConfig,
    pub redirect: RedirectConfig,
    pub frontend: FrontendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
    /// Entries in the link read cache; 0 disables caching
    pub link_cache_max_entries: u64,
    pub link_cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_expiry_hours: u64,
    pub admin_username: String,
    pub admin_password: String,
    #[serde(default)]
    pub turnstile: Option<TurnstileConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnstileConfig {
    pub secret: String,
    pub verify_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub retention_days: u64,
    pub geoip_db_path: Option<String>,
    pub trusted_proxy_mode: TrustedProxyMode,
    pub ip_hash_secret: String,
}

/// Which request headers are allowed to carry the client address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Only `CF-Connecting-IP`
    Cloudflare,
    /// `CF-Connecting-IP`, then `X-Forwarded-For`, then `X-Real-IP`
    Standard,
    /// Socket address only
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectConfig {
    pub default_delay_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Path to directory containing static frontend files
    /// If None, uses embedded frontend
    pub static_dir: Option<String>,
}

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "changeme123";
pub const TURNSTILE_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("HOST", "127.0.0.1");
        let port = var("PORT", "8080")
            .parse::<u16>()
            .context("PORT must be a valid port number")?;
        let base_url = lookup("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let backend = match var("STORAGE_BACKEND", "sqlite").to_lowercase().as_str() {
            "memory" => StorageBackend::Memory,
            "sqlite" => StorageBackend::Sqlite,
            "postgres" | "postgresql" => StorageBackend::Postgres,
            other => {
                tracing::warn!(
                    "Unknown STORAGE_BACKEND '{other}', falling back to 'sqlite'. Supported values: memory, sqlite, postgres"
                );
                StorageBackend::Sqlite
            }
        };

        let storage = StorageConfig {
            backend,
            url: var("DATABASE_URL", "sqlite://./shortlink.db?mode=rwc"),
            max_connections: var("DATABASE_MAX_CONNECTIONS", "5")
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            link_cache_max_entries: var("LINK_CACHE_MAX_ENTRIES", "10000")
                .parse()
                .context("LINK_CACHE_MAX_ENTRIES must be a non-negative integer")?,
            link_cache_ttl_secs: var("LINK_CACHE_TTL_SECS", "60")
                .parse()
                .context("LINK_CACHE_TTL_SECS must be a non-negative integer")?,
        };

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if backend == StorageBackend::Memory => {
                tracing::warn!(
                    "JWT_SECRET not set; generated an ephemeral key, sessions will not survive a restart"
                );
                BASE64_URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>())
            }
            None => bail!("JWT_SECRET must be set when STORAGE_BACKEND is not 'memory'"),
        };

        let turnstile = lookup("TURNSTILE_SECRET")
            .filter(|s| !s.is_empty())
            .map(|secret| TurnstileConfig {
                secret,
                verify_url: var("TURNSTILE_VERIFY_URL", TURNSTILE_VERIFY_URL),
            });

        let auth = AuthConfig {
            jwt_secret: jwt_secret.clone(),
            session_expiry_hours: var("SESSION_EXPIRY_HOURS", "24")
                .parse()
                .context("SESSION_EXPIRY_HOURS must be a positive integer")?,
            admin_username: var("ADMIN_USERNAME", DEFAULT_ADMIN_USERNAME),
            admin_password: var("ADMIN_PASSWORD", DEFAULT_ADMIN_PASSWORD),
            turnstile,
        };

        let trusted_proxy_mode = match var("TRUSTED_PROXY_MODE", "standard").to_lowercase().as_str() {
            "cloudflare" => TrustedProxyMode::Cloudflare,
            "standard" => TrustedProxyMode::Standard,
            "none" => TrustedProxyMode::None,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'standard'. Supported values: cloudflare, standard, none"
                );
                TrustedProxyMode::Standard
            }
        };

        let analytics = AnalyticsConfig {
            retention_days: var("ANALYTICS_RETENTION_DAYS", "90")
                .parse()
                .context("ANALYTICS_RETENTION_DAYS must be a positive integer")?,
            geoip_db_path: lookup("GEOIP_DB_PATH").filter(|s| !s.is_empty()),
            trusted_proxy_mode,
            ip_hash_secret: lookup("IP_HASH_SECRET")
                .filter(|s| !s.is_empty())
                .unwrap_or(jwt_secret),
        };

        let redirect = RedirectConfig {
            default_delay_secs: var("DEFAULT_DELAY_SECS", "5")
                .parse()
                .context("DEFAULT_DELAY_SECS must be an integer")?,
        };

        Ok(Config {
            server: ServerConfig { host, port },
            base_url,
            storage,
            auth,
            analytics,
            redirect,
            frontend: FrontendConfig {
                static_dir: lookup("FRONTEND_STATIC_DIR"),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[("JWT_SECRET", "secret")]).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.auth.session_expiry_hours, 24);
        assert_eq!(config.analytics.retention_days, 90);
        assert_eq!(config.redirect.default_delay_secs, 5);
        assert_eq!(config.analytics.ip_hash_secret, "secret");
        assert!(config.auth.turnstile.is_none());
    }

    #[test]
    fn persistent_backends_require_a_jwt_secret() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("STORAGE_BACKEND", "postgres")]).is_err());

        let config = config_from(&[("STORAGE_BACKEND", "memory")]).unwrap();
        assert!(!config.auth.jwt_secret.is_empty());
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        assert!(config_from(&[("JWT_SECRET", "s"), ("PORT", "eighty")]).is_err());
        assert!(config_from(&[("JWT_SECRET", "s"), ("DEFAULT_DELAY_SECS", "x")]).is_err());
    }

    #[test]
    fn turnstile_is_enabled_by_secret() {
        let config = config_from(&[("JWT_SECRET", "s"), ("TURNSTILE_SECRET", "ts")]).unwrap();
        let turnstile = config.auth.turnstile.unwrap();
        assert_eq!(turnstile.secret, "ts");
        assert_eq!(turnstile.verify_url, TURNSTILE_VERIFY_URL);
    }

    #[test]
    fn base_url_is_normalized() {
        let config = config_from(&[("JWT_SECRET", "s"), ("BASE_URL", "https://sho.rt/")]).unwrap();
        assert_eq!(config.base_url, "https://sho.rt");
    }
}
