use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    response::Response,
    routing::get,
};

use crate::controllers::VideoController;
use crate::errors::{ApiError, ApiResult};
use crate::models::download::{DownloadQuery, VideoInfoQuery};
use crate::models::video::VideoInfoResponse;
use crate::state::AppState;

pub async fn video_info_route(
    State(state): State<AppState>,
    query: Result<Query<VideoInfoQuery>, QueryRejection>,
) -> ApiResult<Json<VideoInfoResponse>> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    VideoController::new(&state).video_info(query).await
}

pub async fn download_route(
    State(state): State<AppState>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    VideoController::new(&state).download(query).await
}

pub fn video_routes() -> Router<AppState> {
    Router::new()
        .route("/video-info", get(video_info_route))
        .route("/download", get(download_route))
}
