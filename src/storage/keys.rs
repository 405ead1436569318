//! Logical key layout shared by every backend
//!
//! ```text
//! link:<code>                         Link JSON                 (links)
//! click:<code>:<timestamp>[-n]        ClickEvent JSON, TTL'd    (analytics)
//! stats:daily:<code>:<YYYY-MM-DD>     DailyAggregate JSON, TTL'd (analytics)
//! admin:user:<username>               AdminUser JSON            (admin)
//! admin:initialized                   bootstrap sentinel        (admin)
//! ```

pub const LINK_PREFIX: &str = "link:";
pub const ADMIN_INITIALIZED: &str = "admin:initialized";

pub fn link(code: &str) -> String {
    format!("{LINK_PREFIX}{code}")
}

/// Short code encoded in a `link:` key
pub fn code_from_link_key(key: &str) -> Option<&str> {
    key.strip_prefix(LINK_PREFIX)
}

pub fn clicks_prefix(code: &str) -> String {
    format!("click:{code}:")
}

/// Click keys normally end in the timestamp; a collision within the same
/// millisecond gets a `-n` suffix so neither event is overwritten.
pub fn click(code: &str, timestamp: i64, collision: u32) -> String {
    if collision == 0 {
        format!("click:{code}:{timestamp}")
    } else {
        format!("click:{code}:{timestamp}-{collision}")
    }
}

pub fn daily_stats_prefix(code: &str) -> String {
    format!("stats:daily:{code}:")
}

pub fn daily_stats(code: &str, date: &str) -> String {
    format!("{}{date}", daily_stats_prefix(code))
}

pub fn admin_user(username: &str) -> String {
    format!("admin:user:{username}")
}
