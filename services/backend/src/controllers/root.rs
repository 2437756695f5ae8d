use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::warn;

use crate::controllers::extractor::Extractor;

/// Shown instead of the underlying error, which can name local paths
const EXTRACTOR_DOWN: &str = "yt-dlp is not available";

pub struct RootController;

impl RootController {
    pub async fn root() -> Response {
        Json(json!({
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": [
                "/video-info",
                "/download",
                "/api/video-info",
                "/api/download",
                "/health",
            ],
        }))
        .into_response()
    }

    /// Healthy only when yt-dlp actually runs.
    pub async fn health_check(extractor: &dyn Extractor) -> Response {
        match extractor.version().await {
            Ok(version) => Json(json!({
                "status": "ok",
                "extractor": extractor.name(),
                "extractorVersion": version,
            }))
            .into_response(),
            Err(e) => {
                warn!(error = %e, "health check failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({
                        "status": "degraded",
                        "extractor": extractor.name(),
                        "error": EXTRACTOR_DOWN,
                    })),
                )
                    .into_response()
            }
        }
    }
}
