use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::analytics::{AnalyticsAggregator, ClickRecorder, GeoIpService, IpHasher};
use crate::api::{create_api_router, static_files::serve_spa};
use crate::auth::AuthService;
use crate::config::{Config, TrustedProxyMode};
use crate::links::LinkRepository;
use crate::redirect::create_redirect_router;
use crate::storage::Stores;
use crate::tasks::BackgroundTasks;

/// Everything a request handler can reach
pub struct AppState {
    pub stores: Stores,
    pub links: LinkRepository,
    pub recorder: ClickRecorder,
    pub aggregator: AnalyticsAggregator,
    pub auth: Arc<AuthService>,
    pub tasks: BackgroundTasks,
    pub geoip: Option<GeoIpService>,
    pub trusted_proxy_mode: TrustedProxyMode,
    pub static_dir: Option<String>,
    pub base_url: String,
}

impl AppState {
    /// Wire services over already-opened stores
    pub fn new(config: &Config, stores: Stores) -> Result<Self> {
        let tasks = BackgroundTasks::new();
        let links = LinkRepository::new(
            Arc::clone(&stores.links),
            Arc::clone(&stores.analytics),
            config.redirect.default_delay_secs,
        );
        let hasher = IpHasher::new(&config.analytics.ip_hash_secret)?;
        let recorder = ClickRecorder::new(
            Arc::clone(&stores.links),
            Arc::clone(&stores.analytics),
            hasher,
            config.analytics.retention_days,
            tasks.clone(),
        );
        let aggregator = AnalyticsAggregator::new(Arc::clone(&stores.analytics), links.clone());
        let auth = Arc::new(AuthService::from_config(
            Arc::clone(&stores.admin),
            &config.auth,
        )?);

        // A missing or corrupt database only costs country resolution
        let geoip = config
            .analytics
            .geoip_db_path
            .as_deref()
            .and_then(|path| match GeoIpService::open(path) {
                Ok(service) => {
                    info!("Loaded GeoIP database from {}", path);
                    Some(service)
                }
                Err(e) => {
                    warn!("GeoIP disabled: {:#}", e);
                    None
                }
            });

        Ok(Self {
            stores,
            links,
            recorder,
            aggregator,
            auth,
            tasks,
            geoip,
            trusted_proxy_mode: config.analytics.trusted_proxy_mode,
            static_dir: config.frontend.static_dir.clone(),
            base_url: config.base_url.clone(),
        })
    }

    /// Open the configured backend and wire services over it
    pub async fn from_config(config: &Config) -> Result<Self> {
        let stores = Stores::from_config(&config.storage)
            .await
            .context("failed to open storage")?;
        Self::new(config, stores)
    }

    pub fn short_url(&self, code: &str) -> String {
        format!("{}/s/{}", self.base_url, code)
    }
}

/// Full HTTP surface: `/api`, `/s/{code}` and the dashboard SPA
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .fallback(serve_spa)
        .with_state(Arc::clone(&state))
        .nest("/api", create_api_router(Arc::clone(&state)))
        .merge(create_redirect_router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
