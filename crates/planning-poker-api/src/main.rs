//! Planning poker API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use planning_poker_api::config::AppConfig;
use planning_poker_api::error::AppError;
use planning_poker_api::state::AppState;
use planning_poker_api::{build_router, reaper};
use planning_poker_core::clock::SystemClock;
use planning_poker_core::replication::NoopEventPublisher;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting planning poker API server");

    let config = AppConfig::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;

    // Single-node deployment; a message bus adapter replaces the no-op publisher.
    let app_state = AppState::new(config, Arc::new(SystemClock), Arc::new(NoopEventPublisher));
    let _reaper = reaper::spawn(app_state.clone());

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = build_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
