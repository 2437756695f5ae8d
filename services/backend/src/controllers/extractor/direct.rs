use std::io;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{StatusCode, header::CONTENT_TYPE};
use tracing::{info, warn};

use super::{Extractor, StreamHandle, YtDlp, fetch_details};
use crate::errors::ProxyError;
use crate::models::download::{DownloadRequest, VideoSource};
use crate::models::video::{ExtractedFormat, VideoDetails};

/// Resolves the media URL with `yt-dlp --get-url` and relays the upstream
/// response as it arrives. Nothing touches local storage.
///
/// Only single-file formats work here; anything yt-dlp would have to merge
/// needs [`super::ProcessExtractor`].
pub struct DirectExtractor {
    ytdlp: YtDlp,
    client: reqwest::Client,
}

impl DirectExtractor {
    pub fn new(ytdlp: YtDlp) -> Self {
        Self {
            ytdlp,
            client: reqwest::Client::new(),
        }
    }
}

fn classify_status(status: StatusCode) -> ProxyError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            ProxyError::UpstreamBlocked(
                "YouTube refused the request. Please try again later.".into(),
            )
        }
        StatusCode::NOT_FOUND | StatusCode::GONE => ProxyError::ContentUnavailable(
            "The media for this video is no longer available".into(),
        ),
        other => ProxyError::ExtractorUnavailable(format!("upstream answered {other}")),
    }
}

#[async_trait]
impl Extractor for DirectExtractor {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn version(&self) -> Result<String, ProxyError> {
        self.ytdlp.version().await
    }

    async fn fetch_metadata(&self, source: &VideoSource) -> Result<VideoDetails, ProxyError> {
        fetch_details(&self.ytdlp, source).await
    }

    async fn open_stream(
        &self,
        request: &DownloadRequest,
        format: &ExtractedFormat,
    ) -> Result<StreamHandle, ProxyError> {
        let media_url = self.ytdlp.media_url(&request.source.url, &format.id).await?;

        // The URL is only honoured with the headers yt-dlp resolved it with
        let mut outgoing = self.client.get(&media_url);
        for (name, value) in &format.http_headers {
            outgoing = outgoing.header(name.as_str(), value.as_str());
        }

        let response = outgoing.send().await.map_err(|e| {
            ProxyError::ExtractorUnavailable(format!("upstream request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                video = %request.source.id,
                format = %format.id,
                %status,
                "upstream rejected media request"
            );
            return Err(classify_status(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let length = response.content_length();
        info!(
            video = %request.source.id,
            format = %format.id,
            ?length,
            "📡 relaying upstream media"
        );

        let source = response.bytes_stream().map_err(io::Error::other).boxed();

        Ok(StreamHandle::new(source)
            .with_content_length(length)
            .with_extension(Some(format.container.clone()).filter(|ext| !ext.is_empty()))
            .with_content_type(content_type))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        http::{HeaderMap, header},
        routing::get,
    };

    use super::*;
    use crate::controllers::extractor::testing::{FakeYtDlp, sample_details};
    use crate::models::download::{FormatSelection, MediaKind};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    fn upstream() -> Router {
        Router::new()
            .route(
                "/media",
                get(|| async { ([(header::CONTENT_TYPE, "video/mp4")], "upstream-bytes") }),
            )
            .route("/blocked", get(|| async { StatusCode::FORBIDDEN }))
            .route("/gone", get(|| async { StatusCode::GONE }))
            .route(
                "/user-agent",
                get(|headers: HeaderMap| async move {
                    headers
                        .get(header::USER_AGENT)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                }),
            )
    }

    fn request() -> DownloadRequest {
        DownloadRequest {
            source: VideoSource::from_id("dQw4w9WgXcQ"),
            selection: FormatSelection::Kind(MediaKind::Video),
            filename: None,
        }
    }

    #[tokio::test]
    async fn relays_upstream_body() {
        let base = serve(upstream()).await;
        let fake = FakeYtDlp::new();
        fake.set_media_url(&format!("{base}/media"));
        let extractor = DirectExtractor::new(fake.ytdlp());
        let format = sample_details().formats.remove(0);

        let handle = extractor.open_stream(&request(), &format).await.unwrap();
        assert_eq!(handle.content_type.as_deref(), Some("video/mp4"));
        assert_eq!(handle.content_length, Some(14));
        assert_eq!(handle.extension.as_deref(), Some("mp4"));
        assert!(handle.temp.is_none());

        let chunks: Vec<_> = handle.source.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"upstream-bytes");
    }

    #[tokio::test]
    async fn sends_headers_yt_dlp_resolved_with() {
        let base = serve(upstream()).await;
        let fake = FakeYtDlp::new();
        fake.set_media_url(&format!("{base}/user-agent"));
        let extractor = DirectExtractor::new(fake.ytdlp());
        let format = sample_details().formats.remove(0);

        let handle = extractor.open_stream(&request(), &format).await.unwrap();
        let chunks: Vec<_> = handle.source.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"Mozilla/5.0 (fixture)");
    }

    #[tokio::test]
    async fn upstream_statuses_are_classified() {
        let base = serve(upstream()).await;
        let fake = FakeYtDlp::new();
        let extractor = DirectExtractor::new(fake.ytdlp());
        let format = sample_details().formats.remove(0);

        fake.set_media_url(&format!("{base}/blocked"));
        let err = extractor.open_stream(&request(), &format).await.unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamBlocked(_)));

        fake.set_media_url(&format!("{base}/gone"));
        let err = extractor.open_stream(&request(), &format).await.unwrap_err();
        assert!(matches!(err, ProxyError::ContentUnavailable(_)));
    }

    #[test]
    fn server_errors_are_extractor_failures() {
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY),
            ProxyError::ExtractorUnavailable(_)
        ));
    }
}
