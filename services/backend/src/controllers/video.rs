use std::sync::Arc;

use axum::{Json, response::Response};
use tracing::info;

use crate::controllers::extractor::Extractor;
use crate::controllers::relay::{self, content_type_for, download_filename};
use crate::controllers::selection::{check_size_limit, select_format};
use crate::controllers::validator::{parse_download_request, parse_video_url};
use crate::errors::{ApiError, ApiResult, ProxyError};
use crate::models::download::{DownloadQuery, FileSizeLimits, MediaKind, VideoInfoQuery};
use crate::models::video::VideoInfoResponse;
use crate::state::AppState;

const VIDEO_INFO_FAILED: &str =
    "Failed to fetch video information. Please check the URL and try again.";
const DOWNLOAD_FAILED: &str = "Failed to download video";

pub struct VideoController {
    extractor: Arc<dyn Extractor>,
    limits: FileSizeLimits,
}

impl VideoController {
    pub fn new(state: &AppState) -> Self {
        VideoController {
            extractor: Arc::clone(&state.extractor),
            limits: state.limits,
        }
    }

    pub async fn video_info(&self, query: VideoInfoQuery) -> ApiResult<Json<VideoInfoResponse>> {
        self.fetch_info(query)
            .await
            .map(Json)
            .map_err(|e| ApiError::from_proxy(e, VIDEO_INFO_FAILED))
    }

    pub async fn download(&self, query: DownloadQuery) -> ApiResult<Response> {
        self.start_download(query)
            .await
            .map_err(|e| ApiError::from_proxy(e, DOWNLOAD_FAILED))
    }

    async fn fetch_info(&self, query: VideoInfoQuery) -> Result<VideoInfoResponse, ProxyError> {
        let source = parse_video_url(query.url.as_deref())?;
        let details = self.extractor.fetch_metadata(&source).await?;
        info!(
            video = %details.id,
            url = %details.webpage_url,
            formats = details.formats.len(),
            "🔎 fetched video info"
        );
        Ok(VideoInfoResponse::from(&details))
    }

    /// Metadata first, so the format is chosen here and not left to yt-dlp.
    async fn start_download(&self, query: DownloadQuery) -> Result<Response, ProxyError> {
        let request = parse_download_request(&query)?;
        let details = self.extractor.fetch_metadata(&request.source).await?;

        let format = select_format(&details.formats, &request.selection)?;
        check_size_limit(format, &self.limits)?;
        let kind = MediaKind::of(format);
        info!(
            video = %request.source.id,
            format = %format.id,
            kind = kind.as_str(),
            backend = self.extractor.name(),
            "selected format"
        );

        let handle = self.extractor.open_stream(&request, format).await?;
        let content_type = content_type_for(format, &handle);
        let extension = handle
            .extension
            .clone()
            .unwrap_or_else(|| format.container.clone());
        let filename =
            download_filename(request.filename.as_deref(), &details.title, kind, &extension);

        relay::into_response(handle, &filename, &content_type)
    }
}
