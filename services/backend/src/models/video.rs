use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::download::VideoSource;

/// The part of `yt-dlp --dump-single-json` we read. Everything is optional;
/// defaults are applied in [`VideoDetails::from_raw`].
#[derive(Deserialize, Debug, Default)]
pub struct RawVideoInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub uploader: Option<String>,
    pub duration: Option<f64>,
    pub view_count: Option<u64>,
    pub upload_date: Option<String>,
    pub webpage_url: Option<String>,
    pub formats: Option<Vec<RawFormat>>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RawFormat {
    pub format_id: Option<String>,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub fps: Option<f64>,
    pub tbr: Option<f64>,
    pub abr: Option<f64>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
    pub format_note: Option<String>,
    /// Headers yt-dlp expects on requests for the media URL
    pub http_headers: Option<BTreeMap<String, String>>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFormat {
    pub id: String,
    pub container: String,
    pub has_video_track: bool,
    pub has_audio_track: bool,
    pub approximate_size: Option<u64>,
    pub quality_label: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub fps: Option<f64>,
    pub bitrate: Option<f64>,
    pub audio_bitrate: Option<f64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub mime_type: Option<String>,
    #[serde(skip)]
    pub http_headers: BTreeMap<String, String>,
}

/// A codec field counts as a track unless it is missing or `"none"`.
fn has_track(codec: Option<&str>) -> bool {
    matches!(codec, Some(value) if !value.is_empty() && value != "none")
}

impl ExtractedFormat {
    /// `None` for entries without a format id; they cannot be requested anyway.
    pub fn from_raw(raw: RawFormat) -> Option<Self> {
        let id = raw.format_id.filter(|id| !id.is_empty())?;
        let container = raw.ext.unwrap_or_default().to_ascii_lowercase();
        let has_video_track = has_track(raw.vcodec.as_deref());
        let has_audio_track = has_track(raw.acodec.as_deref());

        let quality_label = match (raw.format_note.filter(|n| !n.is_empty()), raw.height) {
            (Some(note), _) => note,
            (None, Some(height)) => format!("{height}p"),
            (None, None) if has_audio_track && !has_video_track => "audio only".to_string(),
            (None, None) => "unknown".to_string(),
        };

        let approximate_size = raw
            .filesize
            .or(raw.filesize_approx)
            .filter(|size| *size > 0.0)
            .map(|size| size.round() as u64);

        let mime_type = media_type_for(&container, has_video_track).map(str::to_string);

        Some(Self {
            id,
            container,
            has_video_track,
            has_audio_track,
            approximate_size,
            quality_label,
            height: raw.height,
            width: raw.width,
            fps: raw.fps,
            bitrate: raw.tbr,
            audio_bitrate: raw.abr,
            video_codec: raw.vcodec.filter(|_| has_video_track),
            audio_codec: raw.acodec.filter(|_| has_audio_track),
            mime_type,
            http_headers: raw.http_headers.unwrap_or_default(),
        })
    }

    pub fn is_progressive(&self) -> bool {
        self.has_video_track && self.has_audio_track
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio_track && !self.has_video_track
    }
}

/// Media type for a container, split by whether a video track is present.
pub fn media_type_for(extension: &str, has_video: bool) -> Option<&'static str> {
    let media_type = match (extension.to_ascii_lowercase().as_str(), has_video) {
        ("mp4", true) => "video/mp4",
        ("mp4" | "m4a", _) => "audio/mp4",
        ("webm", true) => "video/webm",
        ("webm" | "weba", false) => "audio/webm",
        ("3gp", _) => "video/3gpp",
        ("mkv", _) => "video/x-matroska",
        ("mov", _) => "video/quicktime",
        ("mp3", _) => "audio/mpeg",
        ("ogg" | "opus", _) => "audio/ogg",
        ("aac", _) => "audio/aac",
        ("flac", _) => "audio/flac",
        ("wav", _) => "audio/wav",
        _ => return None,
    };
    Some(media_type)
}

/// Normalized metadata for one video, all formats included.
#[derive(Clone, Debug)]
pub struct VideoDetails {
    pub id: String,
    pub webpage_url: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub uploader: String,
    pub duration: u64,
    pub view_count: u64,
    pub upload_date: String,
    pub formats: Vec<ExtractedFormat>,
}

impl VideoDetails {
    pub fn from_raw(raw: RawVideoInfo, source: &VideoSource) -> Self {
        let formats = raw
            .formats
            .unwrap_or_default()
            .into_iter()
            .filter_map(ExtractedFormat::from_raw)
            .collect();

        Self {
            id: raw.id.unwrap_or_else(|| source.id.clone()),
            webpage_url: raw.webpage_url.unwrap_or_else(|| source.url.clone()),
            title: raw
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Unknown Title".to_string()),
            description: raw.description.unwrap_or_default(),
            thumbnail: raw.thumbnail.unwrap_or_default(),
            uploader: raw
                .uploader
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            duration: raw
                .duration
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(|d| d.round() as u64)
                .unwrap_or(0),
            view_count: raw.view_count.unwrap_or(0),
            upload_date: raw.upload_date.unwrap_or_default(),
            formats,
        }
    }
}

#[derive(Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct FormatBuckets {
    pub video: Vec<ExtractedFormat>,
    pub audio_only: Vec<ExtractedFormat>,
}

impl FormatBuckets {
    /// Progressive formats go to `video`, audio-only ones to `audio_only`;
    /// video-only renditions are left out.
    pub fn partition(formats: &[ExtractedFormat]) -> Self {
        let mut buckets = Self::default();
        for format in formats {
            if format.is_progressive() {
                buckets.video.push(format.clone());
            } else if format.is_audio_only() {
                buckets.audio_only.push(format.clone());
            }
        }
        buckets
    }
}

/// Body of `GET /video-info`.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfoResponse {
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub uploader: String,
    pub duration: u64,
    pub view_count: u64,
    pub upload_date: String,
    pub formats: FormatBuckets,
}

impl From<&VideoDetails> for VideoInfoResponse {
    fn from(details: &VideoDetails) -> Self {
        Self {
            title: details.title.clone(),
            description: details.description.clone(),
            thumbnail: details.thumbnail.clone(),
            uploader: details.uploader.clone(),
            duration: details.duration,
            view_count: details.view_count,
            upload_date: details.upload_date.clone(),
            formats: FormatBuckets::partition(&details.formats),
        }
    }
}
