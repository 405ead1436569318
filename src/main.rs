use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shortlink::config::Config;
use shortlink::storage::spawn_expiry_sweeper;
use shortlink::{create_app, AppState};

const DEFAULT_TRACING_FILTER: &str = "shortlink=info,tower_http=info";
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_TRACING_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let state = Arc::new(AppState::from_config(&config).await?);

    state.auth.bootstrap().await?;

    let sweeper = spawn_expiry_sweeper(Arc::clone(&state.stores.analytics), EXPIRY_SWEEP_INTERVAL);

    match &config.frontend.static_dir {
        Some(static_dir) => info!("Serving dashboard from directory: {}", static_dir),
        None => info!("Serving embedded dashboard"),
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("   - Short links at {}/s/{{code}}", config.base_url);
    info!("   - API at http://{}/api/...", addr);

    axum::serve(
        listener,
        create_app(Arc::clone(&state)).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    info!(
        "Waiting for {} pending click recordings",
        state.tasks.in_flight()
    );
    state.tasks.wait_idle().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
