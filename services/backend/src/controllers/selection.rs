// Format selection for /download when the caller does not pin an itag
use std::cmp::Ordering;

use crate::errors::ProxyError;
use crate::models::download::{FileSizeLimits, FormatSelection, MediaKind};
use crate::models::video::ExtractedFormat;

/// Video codecs browsers play inside a progressive mp4
const PROGRESSIVE_CODECS: &[&str] = &["avc1", "h264", "mp4v"];
const MP4_FAMILY: &[&str] = &["mp4", "m4a"];

pub fn select_format<'a>(
    formats: &'a [ExtractedFormat],
    selection: &FormatSelection,
) -> Result<&'a ExtractedFormat, ProxyError> {
    match selection {
        FormatSelection::Itag(itag) => {
            let id = itag.to_string();
            formats.iter().find(|f| f.id == id).ok_or_else(|| {
                ProxyError::FormatNotFound(format!("Format {itag} is not available for this video"))
            })
        }
        FormatSelection::Kind(MediaKind::Video) => best_video(formats).ok_or_else(|| {
            ProxyError::FormatNotFound(
                "No format with both video and audio is available for this video".to_string(),
            )
        }),
        FormatSelection::Kind(MediaKind::Audio) => best_audio(formats).ok_or_else(|| {
            ProxyError::FormatNotFound(
                "No audio-only format is available for this video".to_string(),
            )
        }),
    }
}

/// mp4 with a known progressive codec, then any mp4, then the first
/// format carrying both tracks.
pub fn best_video(formats: &[ExtractedFormat]) -> Option<&ExtractedFormat> {
    let progressive = || formats.iter().filter(|f| f.is_progressive());

    first_max_by(
        progressive().filter(|f| is_mp4(f) && has_progressive_codec(f)),
        compare_video,
    )
    .or_else(|| first_max_by(progressive().filter(|f| is_mp4(f)), compare_video))
    .or_else(|| progressive().next())
}

/// Highest bitrate mp4-family audio with a reported bitrate, then the
/// highest bitrate among all audio-only formats.
pub fn best_audio(formats: &[ExtractedFormat]) -> Option<&ExtractedFormat> {
    let audio_only = || formats.iter().filter(|f| f.is_audio_only());

    first_max_by(
        audio_only().filter(|f| is_mp4_family(f) && f.audio_bitrate.is_some()),
        compare_audio,
    )
    .or_else(|| first_max_by(audio_only(), compare_audio))
}

/// Rejects formats whose reported size already exceeds the cap.
pub fn check_size_limit(
    format: &ExtractedFormat,
    limits: &FileSizeLimits,
) -> Result<(), ProxyError> {
    let limit = limits.for_kind(MediaKind::of(format));
    match (format.approximate_size, limit) {
        (Some(size), Some(limit)) if size > limit => Err(ProxyError::TooLarge(format!(
            "Format {} is about {} MB, above the {} MB limit",
            format.id,
            size / (1024 * 1024),
            limit / (1024 * 1024)
        ))),
        _ => Ok(()),
    }
}

fn is_mp4(format: &ExtractedFormat) -> bool {
    format.container == "mp4"
}

fn is_mp4_family(format: &ExtractedFormat) -> bool {
    MP4_FAMILY.contains(&format.container.as_str())
}

fn has_progressive_codec(format: &ExtractedFormat) -> bool {
    format.video_codec.as_deref().is_some_and(|codec| {
        let codec = codec.to_ascii_lowercase();
        PROGRESSIVE_CODECS.iter().any(|known| codec.starts_with(known))
    })
}

fn compare_video(a: &ExtractedFormat, b: &ExtractedFormat) -> Ordering {
    a.height
        .unwrap_or(0)
        .cmp(&b.height.unwrap_or(0))
        .then_with(|| a.fps.unwrap_or(0.0).total_cmp(&b.fps.unwrap_or(0.0)))
        .then_with(|| a.bitrate.unwrap_or(0.0).total_cmp(&b.bitrate.unwrap_or(0.0)))
}

fn compare_audio(a: &ExtractedFormat, b: &ExtractedFormat) -> Ordering {
    let rate = |f: &ExtractedFormat| f.audio_bitrate.or(f.bitrate).unwrap_or(0.0);
    rate(a).total_cmp(&rate(b))
}

/// `Iterator::max_by` keeps the last of equal elements; this keeps the first.
fn first_max_by<'a>(
    candidates: impl Iterator<Item = &'a ExtractedFormat>,
    compare: fn(&ExtractedFormat, &ExtractedFormat) -> Ordering,
) -> Option<&'a ExtractedFormat> {
    candidates.fold(None, |best, candidate| match best {
        Some(current) if compare(candidate, current) != Ordering::Greater => Some(current),
        _ => Some(candidate),
    })
}
