use serde::Deserialize;

use super::video::ExtractedFormat;

#[derive(Deserialize, Clone, Debug, Default)]
pub struct VideoInfoQuery {
    pub url: Option<String>,
}

/// Raw `GET /download` query. Two shapes are accepted:
/// `url` + `format`, or `videoId` + `itag` (+ `filename`).
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    pub url: Option<String>,
    pub video_id: Option<String>,
    pub format: Option<String>,
    pub itag: Option<String>,
    pub filename: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// Anything carrying a video track is treated as video.
    pub fn of(format: &ExtractedFormat) -> Self {
        if format.has_video_track {
            MediaKind::Video
        } else {
            MediaKind::Audio
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatSelection {
    Kind(MediaKind),
    Itag(u32),
}

/// A validated video reference, always in canonical watch-URL form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoSource {
    pub id: String,
    pub url: String,
}

impl VideoSource {
    pub fn from_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            url: format!("https://www.youtube.com/watch?v={id}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    pub source: VideoSource,
    pub selection: FormatSelection,
    pub filename: Option<String>,
}

/// Per-kind download size caps in bytes; `None` means unlimited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileSizeLimits {
    pub video_bytes: Option<u64>,
    pub audio_bytes: Option<u64>,
}

impl FileSizeLimits {
    /// Zero disables the corresponding limit.
    pub fn from_megabytes(video_mb: u64, audio_mb: u64) -> Self {
        let to_bytes = |mb: u64| (mb > 0).then(|| mb.saturating_mul(1024 * 1024));
        Self {
            video_bytes: to_bytes(video_mb),
            audio_bytes: to_bytes(audio_mb),
        }
    }

    pub fn for_kind(&self, kind: MediaKind) -> Option<u64> {
        match kind {
            MediaKind::Video => self.video_bytes,
            MediaKind::Audio => self.audio_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_accepts_camel_case_video_id() {
        let query: DownloadQuery =
            serde_json::from_str(r#"{"videoId": "dQw4w9WgXcQ", "itag": "18"}"#).unwrap();
        assert_eq!(query.video_id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(query.itag.as_deref(), Some("18"));
    }

    #[test]
    fn zero_megabytes_disables_limit() {
        let limits = FileSizeLimits::from_megabytes(100, 0);
        assert_eq!(limits.for_kind(MediaKind::Video), Some(100 * 1024 * 1024));
        assert_eq!(limits.for_kind(MediaKind::Audio), None);
    }
}
