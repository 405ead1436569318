//! Time-windowed statistics rebuilt from stored click events
//!
//! Link analytics scan every event stored for the code and drop the ones
//! outside the window afterwards, so a query costs O(events retained for the
//! link) whatever `days` is. Retention TTLs keep that bounded.

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

use crate::analytics::{utc_day, utc_hour, DAY_MS};
use crate::links::LinkRepository;
use crate::models::{
    AnalyticsData, ClickEvent, DailyAggregate, DailyPoint, DashboardStats, HourlyPoint, NameValue,
};
use crate::now_millis;
use crate::storage::{get_json, keys, KvStore};

pub const RECENT_CLICKS: usize = 10;
pub const ACTIVE_WINDOW_DAYS: i64 = 7;

#[derive(Clone)]
pub struct AnalyticsAggregator {
    analytics: Arc<dyn KvStore>,
    links: LinkRepository,
}

impl AnalyticsAggregator {
    pub fn new(analytics: Arc<dyn KvStore>, links: LinkRepository) -> Self {
        Self { analytics, links }
    }

    pub async fn get_link_analytics(&self, code: &str, days: u32) -> Result<AnalyticsData> {
        self.get_link_analytics_at(code, days, now_millis()).await
    }

    pub async fn get_link_analytics_at(
        &self,
        code: &str,
        days: u32,
        now_ms: i64,
    ) -> Result<AnalyticsData> {
        let cutoff = now_ms - i64::from(days) * DAY_MS;

        let mut clicks: Vec<ClickEvent> = Vec::new();
        let mut countries: HashMap<String, u64> = HashMap::new();
        let mut devices: HashMap<String, u64> = HashMap::new();
        let mut browsers: HashMap<String, u64> = HashMap::new();
        let mut daily: BTreeMap<String, u64> = BTreeMap::new();
        let mut hourly: BTreeMap<u32, u64> = BTreeMap::new();

        for key in self.analytics.list(&keys::clicks_prefix(code)).await? {
            let event = match get_json::<ClickEvent>(self.analytics.as_ref(), &key).await {
                Ok(Some(event)) => event,
                // Expired between list and get
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping unreadable click event: {:#}", e);
                    continue;
                }
            };
            if event.timestamp < cutoff {
                continue;
            }

            *countries.entry(event.country.clone()).or_default() += 1;
            *devices.entry(event.device.to_string()).or_default() += 1;
            *browsers.entry(event.browser.clone()).or_default() += 1;
            *daily.entry(utc_day(event.timestamp)).or_default() += 1;
            *hourly.entry(utc_hour(event.timestamp)).or_default() += 1;
            clicks.push(event);
        }

        let total_clicks = clicks.len() as u64;
        // Key order, which is insertion order for monotonic timestamps
        let recent_clicks = clicks.into_iter().rev().take(RECENT_CLICKS).collect();

        Ok(AnalyticsData {
            total_clicks,
            period: days,
            countries: ranked(countries),
            devices: ranked(devices),
            browsers: ranked(browsers),
            daily: daily
                .into_iter()
                .map(|(date, value)| DailyPoint { date, value })
                .collect(),
            hourly: hourly
                .into_iter()
                .map(|(hour, value)| HourlyPoint { hour, value })
                .collect(),
            recent_clicks,
        })
    }

    pub async fn get_dashboard_stats(&self) -> Result<DashboardStats> {
        self.get_dashboard_stats_at(now_millis()).await
    }

    /// Totals come from link records; today's count from the daily rollups
    pub async fn get_dashboard_stats_at(&self, now_ms: i64) -> Result<DashboardStats> {
        let links = self.links.list_all().await?;
        let today = utc_day(now_ms);
        let active_since = now_ms - ACTIVE_WINDOW_DAYS * DAY_MS;

        let mut stats = DashboardStats {
            total_links: links.len() as u64,
            ..Default::default()
        };

        for view in &links {
            stats.total_clicks += view.link.clicks;
            if view.link.last_clicked_at.is_some_and(|at| at >= active_since) {
                stats.active_links += 1;
            }

            let key = keys::daily_stats(&view.short_code, &today);
            match get_json::<DailyAggregate>(self.analytics.as_ref(), &key).await {
                Ok(Some(daily)) => stats.today_clicks += daily.count,
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable daily rollup: {:#}", e),
            }
        }

        Ok(stats)
    }
}

/// Sort by count descending, then name for a stable order
fn ranked(counts: HashMap<String, u64>) -> Vec<NameValue> {
    let mut entries: Vec<NameValue> = counts
        .into_iter()
        .map(|(name, value)| NameValue { name, value })
        .collect();
    entries.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    entries
}
