//! Click analytics
//!
//! Recording happens off the response path through [`ClickRecorder`];
//! reporting rebuilds windowed statistics in [`AnalyticsAggregator`].

pub mod aggregator;
pub mod geoip;
pub mod ip_extractor;
pub mod recorder;
pub mod user_agent;

pub use aggregator::AnalyticsAggregator;
pub use geoip::GeoIpService;
pub use ip_extractor::{extract_client_ip, IpHasher};
pub use recorder::{ClickContext, ClickRecorder};

use chrono::{DateTime, Timelike, Utc};

pub const DAY_MS: i64 = 86_400_000;

fn utc_datetime(timestamp_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_default()
}

/// `YYYY-MM-DD` of the UTC day containing `timestamp_ms`
pub fn utc_day(timestamp_ms: i64) -> String {
    utc_datetime(timestamp_ms).format("%Y-%m-%d").to_string()
}

pub fn utc_hour(timestamp_ms: i64) -> u32 {
    utc_datetime(timestamp_ms).hour()
}
