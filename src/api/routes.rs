use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::require_admin;

use super::analytics::{get_link_analytics, get_stats};
use super::handlers::{
    api_not_found, change_password, create_link, delete_link, get_link, health_check, list_links,
    login, update_link,
};

/// Routes mounted under `/api`
pub fn create_api_router(state: Arc<AppState>) -> Router {
    // `layer` rather than `route_layer` so unknown paths are also gated
    let protected_routes = Router::new()
        .route("/auth/change-password", post(change_password))
        .route("/links", get(list_links).post(create_link))
        .route(
            "/links/{code}",
            get(get_link).put(update_link).delete(delete_link),
        )
        .route("/analytics/{code}", get(get_link_analytics))
        .route("/stats", get(get_stats))
        .fallback(api_not_found)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.auth),
            require_admin,
        ))
        .with_state(Arc::clone(&state));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(login))
        .with_state(state)
        .merge(protected_routes)
}
