use serde::{Deserialize, Deserializer, Serialize};

/// A stored short link, keyed by its short code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub show_interstitial: bool,
    /// Countdown in seconds; 0 means "use the configured default"
    #[serde(default)]
    pub delay: i64,
    #[serde(default)]
    pub clicks: u64,
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub last_clicked_at: Option<i64>,
}

fn default_true() -> bool {
    true
}

impl Link {
    /// Check if the link has expired at `now_ms`
    pub fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at < now_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    pub url: Option<String>,
    pub custom_suffix: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub show_interstitial: Option<bool>,
    pub delay: Option<i64>,
    pub expires_at: Option<i64>,
}

/// Partial update: absent fields are left unchanged.
///
/// `expiresAt: null` clears the expiry, which is why it is doubly optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLinkRequest {
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub show_interstitial: Option<bool>,
    pub delay: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub expires_at: Option<Option<i64>>,
    pub active: Option<bool>,
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// A link as returned by the API, with its code inlined
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkView {
    pub short_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_url: Option<String>,
    #[serde(flatten)]
    pub link: Link,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkPage {
    pub links: Vec<LinkView>,
    pub pagination: Pagination,
}
