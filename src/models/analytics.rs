//! Data models for click analytics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Coarse device class derived from the user agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable record per resolved redirect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Keyed digest of the client address, never the address itself
    pub ip: String,
    pub country: String,
    pub device: DeviceClass,
    pub browser: String,
    pub os: String,
    pub referrer: String,
}

/// Per-link, per-UTC-day rollup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub count: u64,
    #[serde(default)]
    pub countries: BTreeMap<String, u64>,
    #[serde(default)]
    pub devices: BTreeMap<String, u64>,
    #[serde(default)]
    pub browsers: BTreeMap<String, u64>,
    /// Hour of day (UTC) to clicks
    #[serde(default)]
    pub hours: BTreeMap<u32, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    pub hour: u32,
    pub value: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsData {
    pub total_clicks: u64,
    /// Look-back window in days
    pub period: u32,
    pub countries: Vec<NameValue>,
    pub devices: Vec<NameValue>,
    pub browsers: Vec<NameValue>,
    pub daily: Vec<DailyPoint>,
    pub hourly: Vec<HourlyPoint>,
    pub recent_clicks: Vec<ClickEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_links: u64,
    pub total_clicks: u64,
    pub today_clicks: u64,
    pub active_links: u64,
}
