//! Coarse user-agent classification by ordered substring tests.
//!
//! Every list is checked in order and the first match wins, so a UA that
//! mentions several families resolves to the earliest one listed here.

use crate::models::DeviceClass;

const TABLET_TOKENS: &[&str] = &["ipad", "tablet"];
const MOBILE_TOKENS: &[&str] = &["mobile", "android", "iphone", "ipad", "ipod"];

const BROWSERS: &[(&str, &str)] = &[
    ("chrome", "Chrome"),
    ("firefox", "Firefox"),
    ("safari", "Safari"),
    ("edge", "Edge"),
];

const OPERATING_SYSTEMS: &[(&str, &str)] = &[
    ("windows", "Windows"),
    ("mac", "macOS"),
    ("linux", "Linux"),
    ("android", "Android"),
    ("ios", "iOS"),
    ("iphone", "iOS"),
    ("ipad", "iOS"),
];

pub const OTHER: &str = "Other";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub device: DeviceClass,
    pub browser: &'static str,
    pub os: &'static str,
}

pub fn classify(user_agent: &str) -> UserAgentInfo {
    let ua = user_agent.to_lowercase();
    let contains_any = |tokens: &[&str]| tokens.iter().any(|t| ua.contains(t));
    let first_match = |table: &[(&str, &'static str)]| {
        table
            .iter()
            .find(|(token, _)| ua.contains(token))
            .map_or(OTHER, |(_, name)| *name)
    };

    let device = if contains_any(TABLET_TOKENS) {
        DeviceClass::Tablet
    } else if contains_any(MOBILE_TOKENS) {
        DeviceClass::Mobile
    } else {
        DeviceClass::Desktop
    };

    UserAgentInfo {
        device,
        browser: first_match(BROWSERS),
        os: first_match(OPERATING_SYSTEMS),
    }
}
