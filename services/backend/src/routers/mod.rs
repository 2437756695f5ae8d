pub mod root;
pub mod video;

use axum::{
    Router,
    http::{HeaderValue, header::CONTENT_DISPOSITION},
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;
pub use root::{health_check_route, root_route};
pub use video::video_routes;

/// Browsers only let scripts read `Content-Disposition` when it is exposed.
fn cors(allowed_origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([CONTENT_DISPOSITION]);

    match allowed_origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(e)) => {
            warn!("Invalid FRONTEND_URL, allowing any origin: {}", e);
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

pub fn app(state: AppState, allowed_origin: Option<&str>) -> Router {
    Router::new()
        // Core routes
        .route("/", get(root_route))
        .route("/health", get(health_check_route))
        // Proxy routes, also reachable under /api
        .merge(video_routes())
        .nest("/api", video_routes())
        // Middleware
        .layer(cors(allowed_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
