pub mod analytics;
pub mod link;
pub mod user;

pub use analytics::{
    AnalyticsData, ClickEvent, DailyAggregate, DailyPoint, DashboardStats, DeviceClass,
    HourlyPoint, NameValue,
};
pub use link::{CreateLinkRequest, Link, LinkPage, LinkView, Pagination, UpdateLinkRequest};
pub use user::AdminUser;
