pub mod analytics;
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod links;
pub mod models;
pub mod redirect;
pub mod storage;
pub mod tasks;

pub use app::{create_app, AppState};
pub use error::AppError;

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
