//! Analytics API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::AppError;
use crate::models::{AnalyticsData, DashboardStats};

pub const DEFAULT_DAYS: u32 = 30;
pub const MAX_DAYS: u32 = 365;

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQueryParams {
    /// Look-back window (default: 30, clamped to 1-365)
    pub days: Option<String>,
}

impl AnalyticsQueryParams {
    pub fn days(&self) -> u32 {
        self.days
            .as_deref()
            .and_then(|d| d.trim().parse::<i64>().ok())
            .map_or(DEFAULT_DAYS, |d| d.clamp(1, i64::from(MAX_DAYS)) as u32)
    }
}

/// Get analytics for a specific short code
pub async fn get_link_analytics(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(params): Query<AnalyticsQueryParams>,
) -> Result<Json<AnalyticsData>, AppError> {
    let data = state
        .aggregator
        .get_link_analytics(&code, params.days())
        .await?;
    Ok(Json(data))
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<DashboardStats>, AppError> {
    let stats = state.aggregator.get_dashboard_stats().await?;
    Ok(Json(stats))
}
