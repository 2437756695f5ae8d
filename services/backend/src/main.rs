use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::settings::SETTINGS;
use crate::state::AppState;
mod controllers;
mod errors;
mod models;
mod routers;
mod settings;
mod state;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutting down, letting in-flight downloads finish");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = &*SETTINGS;

    // RUST_LOG wins over LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();
    settings.log_summary();

    let state = AppState::from_settings(settings);
    match state.extractor.version().await {
        Ok(version) => info!("🎬 yt-dlp {} ready ({} backend)", version, state.extractor.name()),
        Err(e) => warn!("⚠️ yt-dlp is not usable yet, /health will report degraded: {}", e),
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.port))
        .await
        .with_context(|| format!("failed to bind port {}", settings.port))?;

    let app = routers::app(state, settings.frontend_url.as_deref());

    info!("🎥 YouTube proxy listening on {}", settings.backend_url);
    info!("📡 Metadata endpoint: /video-info (also /api/video-info)");
    info!("📥 Download endpoint: /download (also /api/download)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
