// Query validation. Nothing in here touches the network or the filesystem.
use url::Url;

use crate::errors::ProxyError;
use crate::models::download::{
    DownloadQuery, DownloadRequest, FormatSelection, MediaKind, VideoSource,
};

const VIDEO_ID_LEN: usize = 11;
const MAX_FILENAME_CHARS: usize = 200;

/// Hosts that serve watch pages, after stripping a leading `www.`
const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "m.youtube.com", "music.youtube.com"];

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn is_video_id(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Pulls the video id out of any of the link shapes YouTube hands out.
fn extract_video_id(raw: &str) -> Option<String> {
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else if raw.contains("://") {
        return None;
    } else {
        format!("https://{raw}")
    };

    let parsed = Url::parse(&with_scheme).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let candidate = if host == "youtu.be" {
        parsed.path_segments()?.next()?.to_string()
    } else if YOUTUBE_HOSTS.contains(&host) {
        let mut segments = parsed.path_segments()?;
        match segments.next()? {
            "watch" => parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned())?,
            "embed" | "shorts" | "live" | "v" => segments.next()?.to_string(),
            _ => return None,
        }
    } else {
        return None;
    };

    is_video_id(&candidate).then_some(candidate)
}

/// Validates `url` and normalizes it to a canonical watch URL.
/// A bare 11-character id is accepted as well.
pub fn parse_video_url(raw: Option<&str>) -> Result<VideoSource, ProxyError> {
    let raw = non_blank(raw).ok_or_else(|| ProxyError::invalid("URL parameter is required"))?;

    if is_video_id(raw) {
        return Ok(VideoSource::from_id(raw));
    }

    extract_video_id(raw)
        .map(|id| VideoSource::from_id(&id))
        .ok_or_else(|| ProxyError::invalid("Invalid YouTube URL"))
}

/// `url` wins over `videoId` when both are given.
pub fn parse_source(url: Option<&str>, video_id: Option<&str>) -> Result<VideoSource, ProxyError> {
    match (non_blank(url), non_blank(video_id)) {
        (Some(url), _) => parse_video_url(Some(url)),
        (None, Some(id)) if is_video_id(id) => Ok(VideoSource::from_id(id)),
        (None, Some(_)) => Err(ProxyError::invalid("Invalid video ID")),
        (None, None) => Err(ProxyError::invalid("URL parameter is required")),
    }
}

pub fn parse_media_kind(raw: Option<&str>) -> Result<MediaKind, ProxyError> {
    match non_blank(raw) {
        Some("video") => Ok(MediaKind::Video),
        Some("audio") => Ok(MediaKind::Audio),
        _ => Err(format_required()),
    }
}

fn format_required() -> ProxyError {
    ProxyError::invalid("Format must be either \"video\" or \"audio\"")
}

pub fn parse_itag(raw: &str) -> Result<u32, ProxyError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ProxyError::invalid("itag must be a positive integer"))
}

pub fn parse_filename(raw: Option<&str>) -> Result<Option<String>, ProxyError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let name = raw.trim();
    if name.is_empty() {
        return Err(ProxyError::invalid("filename must not be empty"));
    }
    if name.chars().count() > MAX_FILENAME_CHARS {
        return Err(ProxyError::invalid(format!(
            "filename must be at most {MAX_FILENAME_CHARS} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(ProxyError::invalid("filename contains control characters"));
    }

    Ok(Some(name.to_string()))
}

/// Builds a [`DownloadRequest`]. An explicit itag takes precedence over
/// `format`, but a `format` that is present must still be valid.
pub fn parse_download_request(query: &DownloadQuery) -> Result<DownloadRequest, ProxyError> {
    let source = parse_source(query.url.as_deref(), query.video_id.as_deref())?;

    let kind = match non_blank(query.format.as_deref()) {
        Some(format) => Some(parse_media_kind(Some(format))?),
        None => None,
    };

    let selection = match (non_blank(query.itag.as_deref()), kind) {
        (Some(itag), _) => FormatSelection::Itag(parse_itag(itag)?),
        (None, Some(kind)) => FormatSelection::Kind(kind),
        (None, None) => return Err(format_required()),
    };

    Ok(DownloadRequest {
        source,
        selection,
        filename: parse_filename(query.filename.as_deref())?,
    })
}
