use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use tokio::fs::{self, File};
use tokio::runtime::Handle;
use tokio_stream::wrappers::ReadDirStream;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Extractor, StreamHandle, YtDlp, fetch_details};
use crate::errors::ProxyError;
use crate::models::download::{DownloadRequest, FileSizeLimits, MediaKind, VideoSource};
use crate::models::video::{ExtractedFormat, VideoDetails};

/// Suffixes yt-dlp uses while a download is still in flight
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp"];

/// `<kind>_<unix millis>_<12 hex chars>`
pub fn download_token(kind: MediaKind) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}",
        kind.as_str(),
        Utc::now().timestamp_millis(),
        &random[..12]
    )
}

/// A job directory owned by exactly one request. Dropping it removes the
/// directory and everything yt-dlp left in it.
#[derive(Debug)]
pub struct TempDownload {
    dir: PathBuf,
    token: String,
}

impl TempDownload {
    /// `create_dir` fails on an existing directory, so two requests can never
    /// end up sharing one.
    pub async fn create(root: &Path, token: &str) -> Result<Self, ProxyError> {
        fs::create_dir_all(root).await?;
        let dir = root.join(token);
        fs::create_dir(&dir).await?;
        Ok(Self {
            dir,
            token: token.to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn output_template(&self) -> PathBuf {
        self.dir.join(format!("{}.%(ext)s", self.token))
    }

    fn owns(&self, dir: &Path, candidate: &Path) -> bool {
        let Some(name) = candidate.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        candidate.parent() == Some(dir)
            && name.starts_with(&self.token)
            && !PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
    }

    /// Finds the finished file, trusting the path yt-dlp printed only when it
    /// points inside this job directory.
    pub async fn locate(&self, printed: Option<&Path>) -> Result<PathBuf, ProxyError> {
        let dir = fs::canonicalize(&self.dir).await?;

        if let Some(printed) = printed {
            match fs::canonicalize(printed).await {
                Ok(path) if self.owns(&dir, &path) => return Ok(path),
                Ok(path) => {
                    warn!(path = %path.display(), "ignoring file outside the job directory")
                }
                Err(e) => {
                    warn!(path = %printed.display(), error = %e, "printed path does not exist")
                }
            }
        }

        let mut entries = ReadDirStream::new(fs::read_dir(&dir).await?);
        while let Some(entry) = entries.try_next().await? {
            let path = entry.path();
            if self.owns(&dir, &path) && entry.file_type().await?.is_file() {
                debug!(path = %path.display(), "found download by scanning");
                return Ok(path);
            }
        }

        Err(ProxyError::ExtractorUnavailable(format!(
            "yt-dlp produced no file for {}",
            self.token
        )))
    }

    /// Removes the job directory without holding up a runtime thread. Every
    /// path that still has an async context ends the guard this way.
    pub async fn cleanup(mut self) {
        let dir = std::mem::take(&mut self.dir);
        log_removal(&dir, fs::remove_dir_all(&dir).await);
    }
}

impl Drop for TempDownload {
    /// Fallback for guards nobody awaited `cleanup` on. Inside the runtime the
    /// removal goes to the blocking pool so a worker thread never waits on
    /// the filesystem.
    fn drop(&mut self) {
        if self.dir.as_os_str().is_empty() {
            return;
        }
        let dir = std::mem::take(&mut self.dir);
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || log_removal(&dir, std::fs::remove_dir_all(&dir)));
            }
            Err(_) => log_removal(&dir, std::fs::remove_dir_all(&dir)),
        }
    }
}

fn log_removal(dir: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => debug!(dir = %dir.display(), "removed temporary download"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %dir.display(), error = %e, "failed to remove temporary download"),
    }
}

/// The finished file, opened and ready to stream
struct Downloaded {
    file: File,
    length: u64,
    extension: Option<String>,
}

/// Lets yt-dlp download (and merge) into a job directory, then streams the
/// finished file.
pub struct ProcessExtractor {
    ytdlp: YtDlp,
    download_dir: PathBuf,
    limits: FileSizeLimits,
}

impl ProcessExtractor {
    pub fn new(ytdlp: YtDlp, download_dir: PathBuf, limits: FileSizeLimits) -> Self {
        Self {
            ytdlp,
            download_dir,
            limits,
        }
    }

    async fn download_into(
        &self,
        temp: &TempDownload,
        request: &DownloadRequest,
        format: &ExtractedFormat,
        limit: Option<u64>,
    ) -> Result<Downloaded, ProxyError> {
        let printed = self
            .ytdlp
            .download(&request.source.url, &format.id, &temp.output_template(), limit)
            .await?;

        // A clean exit with no file under a size cap means yt-dlp skipped it
        // quietly, since `--print` silences the abort message.
        let path = match (temp.locate(printed.as_deref()).await, limit) {
            (Err(ProxyError::ExtractorUnavailable(detail)), Some(limit)) => {
                warn!(token = temp.token(), limit, %detail, "no file under a size cap");
                return Err(ProxyError::too_large(limit));
            }
            (located, _) => located?,
        };

        let file = File::open(&path).await?;
        let length = file.metadata().await?.len();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        Ok(Downloaded {
            file,
            length,
            extension,
        })
    }
}

#[async_trait]
impl Extractor for ProcessExtractor {
    fn name(&self) -> &'static str {
        "process"
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
        let kind = MediaKind::of(format);
        let temp = TempDownload::create(&self.download_dir, &download_token(kind)).await?;
        info!(
            video = %request.source.id,
            format = %format.id,
            dir = %temp.dir().display(),
            "📥 downloading"
        );

        let limit = self.limits.for_kind(kind);
        let downloaded = match self.download_into(&temp, request, format, limit).await {
            Ok(downloaded) => downloaded,
            Err(e) => {
                temp.cleanup().await;
                return Err(e);
            }
        };
        info!(token = temp.token(), bytes = downloaded.length, "download ready");

        Ok(StreamHandle::new(ReaderStream::new(downloaded.file).boxed())
            .with_content_length(Some(downloaded.length))
            .with_extension(downloaded.extension)
            .with_temp(temp))
    }
}
