mod config;
mod engine;
mod errors;
mod models;
mod routes;
mod session;
mod state;
mod sync;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::engine::HttpEngine;
use crate::routes::build_router;
use crate::state::AppState;
use crate::sync::SyncController;

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration first; a missing engine URL stops startup here
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Roadmap API v{}", env!("CARGO_PKG_VERSION"));

    let engine = HttpEngine::new(
        &config.engine_url,
        Duration::from_secs(config.engine_timeout_secs),
    )?;
    info!(
        "Analysis engine at {} (timeout {}s)",
        config.engine_url, config.engine_timeout_secs
    );

    let state = AppState {
        sync: Arc::new(SyncController::new(
            Arc::new(engine),
            config.max_document_bytes,
        )),
        config: config.clone(),
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
