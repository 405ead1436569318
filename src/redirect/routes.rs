use axum::{routing::get, Router};
use std::sync::Arc;

use crate::app::AppState;

use super::handlers::{follow_link, follow_link_nested};

/// Short-link routes under `/s/`
pub fn create_redirect_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/s/{code}", get(follow_link))
        .route("/s/{code}/", get(follow_link))
        .route("/s/{code}/{*rest}", get(follow_link_nested))
        .with_state(state)
}
