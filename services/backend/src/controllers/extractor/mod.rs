use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tracing::info;

use crate::errors::ProxyError;
use crate::models::download::{DownloadRequest, VideoSource};
use crate::models::video::{ExtractedFormat, VideoDetails};
use crate::settings::Settings;

mod direct;
mod process;
mod ytdlp;

#[cfg(test)]
pub mod testing;

pub use direct::DirectExtractor;
pub use process::{ProcessExtractor, TempDownload};
pub use ytdlp::YtDlp;

pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// An opened media source. `temp` owns whatever scratch storage backs
/// `source` and must live until the last chunk is relayed.
pub struct StreamHandle {
    pub source: ByteStream,
    pub content_length: Option<u64>,
    pub extension: Option<String>,
    pub content_type: Option<String>,
    pub temp: Option<TempDownload>,
}

impl StreamHandle {
    pub fn new(source: ByteStream) -> Self {
        Self {
            source,
            content_length: None,
            extension: None,
            content_type: None,
            temp: None,
        }
    }

    pub fn with_content_length(mut self, length: Option<u64>) -> Self {
        self.content_length = length;
        self
    }

    pub fn with_extension(mut self, extension: Option<String>) -> Self {
        self.extension = extension;
        self
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_temp(mut self, temp: TempDownload) -> Self {
        self.temp = Some(temp);
        self
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("content_length", &self.content_length)
            .field("extension", &self.extension)
            .field("content_type", &self.content_type)
            .field("temp", &self.temp)
            .finish_non_exhaustive()
    }
}

/// The only way the service talks to YouTube.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn version(&self) -> Result<String, ProxyError>;

    async fn fetch_metadata(&self, source: &VideoSource) -> Result<VideoDetails, ProxyError>;

    /// Resolves once the bytes of `format` are ready to be read.
    async fn open_stream(
        &self,
        request: &DownloadRequest,
        format: &ExtractedFormat,
    ) -> Result<StreamHandle, ProxyError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExtractorBackend {
    /// yt-dlp writes to a job directory, the file is streamed afterwards
    #[default]
    Process,
    /// yt-dlp resolves the media URL, bytes come straight from upstream
    Direct,
}

impl FromStr for ExtractorBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "process" => Ok(Self::Process),
            "direct" => Ok(Self::Direct),
            other => Err(format!("unknown extractor backend {other:?}")),
        }
    }
}

pub fn build_extractor(settings: &Settings) -> Arc<dyn Extractor> {
    let ytdlp = YtDlp::new(&settings.ytdlp_path);
    info!(
        backend = ?settings.extractor_backend,
        ytdlp = %settings.ytdlp_path.display(),
        "extractor configured"
    );

    match settings.extractor_backend {
        ExtractorBackend::Process => Arc::new(ProcessExtractor::new(
            ytdlp,
            settings.download_dir.clone(),
            settings.limits,
        )),
        ExtractorBackend::Direct => Arc::new(DirectExtractor::new(ytdlp)),
    }
}

/// Shared by both backends: dump and normalize.
pub(crate) async fn fetch_details(
    ytdlp: &YtDlp,
    source: &VideoSource,
) -> Result<VideoDetails, ProxyError> {
    let raw = ytdlp.dump_info(&source.url).await?;
    Ok(VideoDetails::from_raw(raw, source))
}
