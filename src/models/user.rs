use serde::{Deserialize, Serialize};

/// Stored under `admin:user:<username>` in the admin namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub username: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: Option<i64>,
}
