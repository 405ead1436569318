use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::links::shortcode::{generate_code, is_valid_destination, is_valid_suffix};
use crate::models::{CreateLinkRequest, Link, LinkPage, LinkView, Pagination, UpdateLinkRequest};
use crate::now_millis;
use crate::storage::{get_json, keys, update_json, KvStore};

/// CRUD over link records, plus the clean-up of a link's analytics on delete
#[derive(Clone)]
pub struct LinkRepository {
    links: Arc<dyn KvStore>,
    analytics: Arc<dyn KvStore>,
    default_delay_secs: i64,
}

impl LinkRepository {
    pub fn new(links: Arc<dyn KvStore>, analytics: Arc<dyn KvStore>, default_delay_secs: i64) -> Self {
        Self {
            links,
            analytics,
            default_delay_secs,
        }
    }

    pub fn default_delay_secs(&self) -> i64 {
        self.default_delay_secs
    }

    pub async fn get(&self, code: &str) -> Result<Option<Link>> {
        get_json(self.links.as_ref(), &keys::link(code)).await
    }

    /// Overwrite the whole record
    pub async fn put(&self, code: &str, link: &Link) -> Result<()> {
        crate::storage::put_json(self.links.as_ref(), &keys::link(code), link, None).await
    }

    pub async fn delete(&self, code: &str) -> Result<bool> {
        self.links.delete(&keys::link(code)).await
    }

    /// Every link, newest first.
    ///
    /// Reads each record individually, so the cost grows with the number of
    /// stored links.
    pub async fn list_all(&self) -> Result<Vec<LinkView>> {
        let mut views = Vec::new();
        for key in self.links.list(keys::LINK_PREFIX).await? {
            let Some(code) = keys::code_from_link_key(&key) else {
                continue;
            };
            match get_json::<Link>(self.links.as_ref(), &key).await {
                Ok(Some(link)) => views.push(LinkView {
                    short_code: code.to_string(),
                    short_url: None,
                    link,
                }),
                // Deleted between list and get
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable link '{}': {:#}", code, e),
            }
        }

        views.sort_by(|a, b| {
            b.link
                .created_at
                .cmp(&a.link.created_at)
                .then_with(|| a.short_code.cmp(&b.short_code))
        });
        Ok(views)
    }

    pub async fn list(&self, page: usize, limit: usize) -> Result<LinkPage> {
        let page = page.max(1);
        let limit = limit.max(1);
        let all = self.list_all().await?;

        let total = all.len();
        let links = all
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();

        Ok(LinkPage {
            links,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: total.div_ceil(limit),
            },
        })
    }

    pub async fn create_link(
        &self,
        request: CreateLinkRequest,
        created_by: &str,
    ) -> Result<(String, Link), AppError> {
        let url = request
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(AppError::MissingField("url"))?;
        if !is_valid_destination(url) {
            return Err(AppError::InvalidUrl);
        }

        let custom_suffix = request.custom_suffix.as_deref().filter(|s| !s.is_empty());
        if let Some(suffix) = custom_suffix {
            if !is_valid_suffix(suffix) {
                return Err(AppError::InvalidSuffix);
            }
        }

        let link = Link {
            url: url.to_string(),
            title: request.title.unwrap_or_default(),
            description: request.description.unwrap_or_default(),
            show_interstitial: request.show_interstitial != Some(false),
            delay: match request.delay {
                None | Some(0) => self.default_delay_secs,
                Some(delay) => delay,
            },
            clicks: 0,
            created_at: now_millis(),
            updated_at: None,
            created_by: created_by.to_string(),
            updated_by: None,
            expires_at: request.expires_at.filter(|&at| at != 0),
            active: true,
            last_clicked_at: None,
        };
        let raw = serde_json::to_string(&link).map_err(anyhow::Error::from)?;

        let code = match custom_suffix {
            Some(suffix) => {
                if !self.insert_new(suffix, &raw).await? {
                    return Err(AppError::SuffixTaken);
                }
                suffix.to_string()
            }
            None => loop {
                let candidate = generate_code();
                if self.insert_new(&candidate, &raw).await? {
                    break candidate;
                }
                debug!("Generated short code '{}' already taken, retrying", candidate);
            },
        };

        info!("Created short link '{}' -> {}", code, link.url);
        Ok((code, link))
    }

    /// Write only if no live link holds `code` yet
    async fn insert_new(&self, code: &str, raw: &str) -> Result<bool> {
        self.links
            .compare_and_swap(&keys::link(code), None, raw, None)
            .await
    }

    pub async fn update_link(
        &self,
        code: &str,
        request: UpdateLinkRequest,
        updated_by: &str,
    ) -> Result<Link, AppError> {
        let url = request
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());
        if let Some(url) = url {
            if !is_valid_destination(url) {
                return Err(AppError::InvalidUrl);
            }
        }

        // Clicks may land while we edit; the CAS loop keeps their increments
        let updated = update_json(self.links.as_ref(), &keys::link(code), None, |current| {
            let mut link: Link = current?;
            if let Some(url) = url {
                link.url = url.to_string();
            }
            if let Some(title) = &request.title {
                link.title = title.clone();
            }
            if let Some(description) = &request.description {
                link.description = description.clone();
            }
            if let Some(show_interstitial) = request.show_interstitial {
                link.show_interstitial = show_interstitial;
            }
            if let Some(delay) = request.delay {
                link.delay = delay;
            }
            if let Some(expires_at) = request.expires_at {
                link.expires_at = expires_at.filter(|&at| at != 0);
            }
            if let Some(active) = request.active {
                link.active = active;
            }
            link.updated_at = Some(now_millis());
            link.updated_by = Some(updated_by.to_string());
            Some(link)
        })
        .await?;

        let link = updated.ok_or(AppError::NotFound)?;
        info!("Updated short link '{}'", code);
        Ok(link)
    }

    /// Remove the link together with its click events and daily rollups
    pub async fn delete_link(&self, code: &str) -> Result<(), AppError> {
        if !self.delete(code).await? {
            return Err(AppError::NotFound);
        }

        let mut purged = 0usize;
        for prefix in [keys::clicks_prefix(code), keys::daily_stats_prefix(code)] {
            for key in self.analytics.list(&prefix).await? {
                if self.analytics.delete(&key).await? {
                    purged += 1;
                }
            }
        }

        info!("Deleted short link '{}' ({} analytics entries)", code, purged);
        Ok(())
    }
}
