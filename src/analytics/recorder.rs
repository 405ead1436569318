//! Per-click side effects of a redirect
//!
//! Each click writes one immutable [`ClickEvent`], bumps the link's daily
//! rollup and bumps the link's own counter. Counter updates go through
//! compare-and-swap so concurrent clicks on the same link are not lost.

use anyhow::{bail, Result};
use axum::http::{header, HeaderMap};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::analytics::geoip::GeoIpService;
use crate::analytics::ip_extractor::{extract_client_ip, parse_ip, IpHasher};
use crate::analytics::user_agent::classify;
use crate::analytics::{utc_day, utc_hour};
use crate::config::TrustedProxyMode;
use crate::models::{ClickEvent, DailyAggregate, Link};
use crate::now_millis;
use crate::storage::{keys, update_json, KvStore, MAX_CAS_ATTEMPTS};
use crate::tasks::BackgroundTasks;

pub const UNKNOWN_COUNTRY: &str = "XX";

/// Request metadata captured before the response is sent
#[derive(Debug, Clone, PartialEq)]
pub struct ClickContext {
    /// Raw client address; only its digest is ever stored
    pub client_ip: String,
    pub country: String,
    pub user_agent: String,
    pub referrer: String,
}

impl ClickContext {
    pub fn from_request(
        headers: &HeaderMap,
        socket_addr: Option<IpAddr>,
        mode: TrustedProxyMode,
        geoip: Option<&GeoIpService>,
    ) -> Self {
        let client_ip = extract_client_ip(headers, socket_addr, mode);
        let header_str = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .filter(|s| !s.is_empty())
        };

        let country = header_str(header::HeaderName::from_static("cf-ipcountry"))
            .map(str::to_string)
            .or_else(|| {
                let ip = parse_ip(&client_ip)?;
                geoip?.country_code(ip)
            })
            .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());

        Self {
            country,
            user_agent: header_str(header::USER_AGENT)
                .unwrap_or("unknown")
                .to_string(),
            referrer: header_str(header::REFERER)
                .unwrap_or("direct")
                .to_string(),
            client_ip,
        }
    }
}

#[derive(Clone)]
pub struct ClickRecorder {
    links: Arc<dyn KvStore>,
    analytics: Arc<dyn KvStore>,
    hasher: IpHasher,
    retention: Duration,
    tasks: BackgroundTasks,
}

impl ClickRecorder {
    pub fn new(
        links: Arc<dyn KvStore>,
        analytics: Arc<dyn KvStore>,
        hasher: IpHasher,
        retention_days: u64,
        tasks: BackgroundTasks,
    ) -> Self {
        Self {
            links,
            analytics,
            hasher,
            retention: Duration::from_secs(retention_days.saturating_mul(86_400)),
            tasks,
        }
    }

    /// Record a click in the background; failures are logged and dropped
    pub fn dispatch(&self, code: String, context: ClickContext) {
        let recorder = self.clone();
        self.tasks.spawn(async move {
            if let Err(e) = recorder.record(&code, &context).await {
                warn!("Failed to record click for '{}': {:#}", code, e);
            }
        });
    }

    pub async fn record(&self, code: &str, context: &ClickContext) -> Result<ClickEvent> {
        self.record_at(code, context, now_millis()).await
    }

    pub async fn record_at(
        &self,
        code: &str,
        context: &ClickContext,
        timestamp: i64,
    ) -> Result<ClickEvent> {
        let agent = classify(&context.user_agent);
        let event = ClickEvent {
            timestamp,
            ip: self.hasher.hash(&context.client_ip),
            country: context.country.clone(),
            device: agent.device,
            browser: agent.browser.to_string(),
            os: agent.os.to_string(),
            referrer: context.referrer.clone(),
        };

        self.append_event(code, &event).await?;
        self.bump_daily(code, &event).await?;
        self.bump_link(code, timestamp).await?;

        debug!(
            "Recorded click on '{}' ({}, {}, {})",
            code, event.country, event.device, event.browser
        );
        Ok(event)
    }

    async fn append_event(&self, code: &str, event: &ClickEvent) -> Result<()> {
        let raw = serde_json::to_string(event)?;
        for collision in 0..MAX_CAS_ATTEMPTS {
            let key = keys::click(code, event.timestamp, collision);
            if self
                .analytics
                .compare_and_swap(&key, None, &raw, Some(self.retention))
                .await?
            {
                return Ok(());
            }
        }
        bail!(
            "more than {MAX_CAS_ATTEMPTS} clicks on '{code}' at {}",
            event.timestamp
        )
    }

    async fn bump_daily(&self, code: &str, event: &ClickEvent) -> Result<()> {
        let key = keys::daily_stats(code, &utc_day(event.timestamp));
        let hour = utc_hour(event.timestamp);

        update_json(
            self.analytics.as_ref(),
            &key,
            Some(self.retention),
            |current: Option<DailyAggregate>| {
                let mut daily = current.unwrap_or_default();
                daily.count += 1;
                *daily.countries.entry(event.country.clone()).or_default() += 1;
                *daily.devices.entry(event.device.to_string()).or_default() += 1;
                *daily.browsers.entry(event.browser.clone()).or_default() += 1;
                *daily.hours.entry(hour).or_default() += 1;
                Some(daily)
            },
        )
        .await?;
        Ok(())
    }

    async fn bump_link(&self, code: &str, timestamp: i64) -> Result<()> {
        let updated = update_json(
            self.links.as_ref(),
            &keys::link(code),
            None,
            |current: Option<Link>| {
                // Deleted since the redirect resolved it
                let mut link = current?;
                link.clicks += 1;
                link.last_clicked_at = Some(timestamp);
                Some(link)
            },
        )
        .await?;

        if updated.is_none() {
            debug!("Link '{}' vanished before its click was counted", code);
        }
        Ok(())
    }
}
