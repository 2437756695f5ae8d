// Test doubles for the extractor boundary
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tempfile::TempDir;

use super::{Extractor, StreamHandle, YtDlp};
use crate::errors::ProxyError;
use crate::models::download::{DownloadRequest, VideoSource};
use crate::models::video::{ExtractedFormat, RawVideoInfo, VideoDetails};

pub const INFO_JSON: &str = r#"{
    "id": "dQw4w9WgXcQ",
    "title": "Fake Video",
    "description": "a description",
    "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg",
    "uploader": "Fake Channel",
    "duration": 212,
    "view_count": 1234,
    "upload_date": "20091025",
    "formats": [
        {
            "format_id": "18", "ext": "mp4", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2",
            "height": 360, "width": 640, "fps": 25, "tbr": 503.5, "filesize": 13000000,
            "http_headers": {"User-Agent": "Mozilla/5.0 (fixture)", "Accept": "*/*"}
        },
        {
            "format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2",
            "abr": 129.5, "filesize": 3400000
        },
        {
            "format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none",
            "height": 1080, "width": 1920
        }
    ]
}"#;

/// Stand-in for the yt-dlp CLI. Ids containing `privatevid1` or
/// `blockedvid1` fail like yt-dlp does. `missingfil1` exits cleanly without
/// writing anything, `bigvideo001` reports a max-filesize skip and
/// `slowvideo01` sleeps before writing.
const SCRIPT: &str = r##"#!/bin/sh
here=$(dirname "$0")
out=""
url=""
format=""
mode="download"
while [ $# -gt 0 ]; do
  case "$1" in
    --version) echo "2099.01.01"; exit 0 ;;
    --dump-single-json) mode="info"; shift ;;
    --get-url) mode="url"; shift ;;
    --output) out="$2"; shift 2 ;;
    --format) format="$2"; shift 2 ;;
    --print|--max-filesize) shift 2 ;;
    -*) shift ;;
    *) url="$1"; shift ;;
  esac
done
case "$url" in
  *privatevid1*)
    echo "ERROR: [youtube] privatevid1: Private video. Sign in if you've been granted access" >&2
    exit 1 ;;
  *blockedvid1*)
    echo "ERROR: [youtube] blockedvid1: Sign in to confirm you're not a bot" >&2
    exit 1 ;;
esac
case "$mode" in
  info) cat "$here/info.json" ;;
  url) cat "$here/media_url" ;;
  download)
    case "$url" in
      *missingfil1*) exit 0 ;;
      *bigvideo001*)
        echo "[download] File is larger than max-filesize (13000000 bytes > 1048576 bytes). Aborting."
        exit 0 ;;
      *slowvideo01*) sleep 5 ;;
    esac
    path=$(printf '%s' "$out" | sed 's/%(ext)s/mp4/')
    printf 'payload:%s:%s' "$url" "$format" > "$path"
    echo "$path"
    ;;
esac
"##;

pub struct FakeYtDlp {
    dir: TempDir,
}

impl FakeYtDlp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("yt-dlp.sh"), SCRIPT).unwrap();
        std::fs::write(dir.path().join("info.json"), INFO_JSON).unwrap();
        Self { dir }
    }

    /// Run through `/bin/sh` so the script never has to be executable.
    pub fn ytdlp(&self) -> YtDlp {
        let script = self.dir.path().join("yt-dlp.sh");
        YtDlp::new("/bin/sh").with_base_args([script.to_string_lossy().into_owned()])
    }

    pub fn set_media_url(&self, url: &str) {
        std::fs::write(self.dir.path().join("media_url"), url).unwrap();
    }
}

/// Job directories removed by `Drop` go away on the blocking pool, so give
/// that a moment before counting what is left under `root`.
pub async fn leftovers_after_cleanup(root: &Path) -> usize {
    for _ in 0..100 {
        if std::fs::read_dir(root).unwrap().next().is_none() {
            return 0;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    std::fs::read_dir(root).unwrap().count()
}

pub fn sample_details() -> VideoDetails {
    let raw: RawVideoInfo = serde_json::from_str(INFO_JSON).unwrap();
    VideoDetails::from_raw(raw, &VideoSource::from_id("dQw4w9WgXcQ"))
}

type Failure = Box<dyn Fn() -> ProxyError + Send + Sync>;

/// Serves fixed metadata and an in-memory payload of
/// `payload:<video id>:<format id>`, split into two chunks.
pub struct StaticExtractor {
    details: VideoDetails,
    failure: Option<Failure>,
    opened: AtomicUsize,
}

impl StaticExtractor {
    pub fn new(details: VideoDetails) -> Self {
        Self {
            details,
            failure: None,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn failing(failure: impl Fn() -> ProxyError + Send + Sync + 'static) -> Self {
        Self {
            failure: Some(Box::new(failure)),
            ..Self::new(sample_details())
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for StaticExtractor {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn version(&self) -> Result<String, ProxyError> {
        match &self.failure {
            Some(failure) => Err(failure()),
            None => Ok("test".to_string()),
        }
    }

    async fn fetch_metadata(&self, _source: &VideoSource) -> Result<VideoDetails, ProxyError> {
        match &self.failure {
            Some(failure) => Err(failure()),
            None => Ok(self.details.clone()),
        }
    }

    async fn open_stream(
        &self,
        request: &DownloadRequest,
        format: &ExtractedFormat,
    ) -> Result<StreamHandle, ProxyError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let payload = format!("payload:{}:{}", request.source.id, format.id).into_bytes();
        let length = payload.len() as u64;
        let (head, tail) = payload.split_at(payload.len() / 2);
        let chunks = vec![
            Ok(Bytes::copy_from_slice(head)),
            Ok(Bytes::copy_from_slice(tail)),
        ];

        Ok(StreamHandle::new(futures::stream::iter(chunks).boxed())
            .with_content_length(Some(length)))
    }
}
