use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

/// Everything that can go wrong between the query string and the last relayed byte.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Missing or malformed url, format, itag or filename
    #[error("{0}")]
    InvalidInput(String),

    /// Private, deleted, age-gated or region-locked video
    #[error("{0}")]
    ContentUnavailable(String),

    /// YouTube refused the request (403, 429, bot check)
    #[error("{0}")]
    UpstreamBlocked(String),

    /// No format matches the requested selector or itag
    #[error("{0}")]
    FormatNotFound(String),

    /// Selected format is larger than the configured limit
    #[error("{0}")]
    TooLarge(String),

    #[error("{0}")]
    QuotaExceeded(String),

    /// yt-dlp missing, crashed or produced output we cannot use
    #[error("extractor unavailable: {0}")]
    ExtractorUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn too_large(limit_bytes: u64) -> Self {
        Self::TooLarge(format!(
            "The selected format is larger than the {} MB limit",
            limit_bytes / (1024 * 1024)
        ))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::ContentUnavailable(_) | Self::FormatNotFound(_) => StatusCode::NOT_FOUND,
            Self::UpstreamBlocked(_) => StatusCode::FORBIDDEN,
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::QuotaExceeded(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ExtractorUnavailable(_) | Self::Internal(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Classifies a failed yt-dlp run by its stderr.
    ///
    /// Bot checks are matched before availability because both mention
    /// "Sign in".
    pub fn from_ytdlp_stderr(stderr: &str) -> Self {
        let lower = stderr.to_lowercase();
        let contains_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if lower.contains("quota") {
            return Self::QuotaExceeded(
                "The extraction quota has been exceeded. Please try again later.".to_string(),
            );
        }

        if contains_any(&[
            "not a bot",
            "http error 403",
            "http error 429",
            "too many requests",
        ]) {
            return Self::UpstreamBlocked(
                "YouTube refused the request. Please try again later.".to_string(),
            );
        }

        if lower.contains("requested format is not available") {
            return Self::FormatNotFound(
                "Requested format is not available for this video".to_string(),
            );
        }

        if contains_any(&[
            "private video",
            "video unavailable",
            "this video is unavailable",
            "has been removed",
            "not available in your country",
            "confirm your age",
            "members-only",
            "account associated with this video has been terminated",
        ]) {
            return Self::ContentUnavailable(
                "This video is unavailable (private, deleted or region-locked)".to_string(),
            );
        }

        if contains_any(&["unsupported url", "is not a valid url", "incomplete youtube id"]) {
            return Self::invalid("Invalid YouTube URL");
        }

        Self::ExtractorUnavailable(last_error_line(stderr))
    }
}

/// The line yt-dlp prefixes with `ERROR:`, or the last non-empty one.
fn last_error_line(stderr: &str) -> String {
    let lines = || stderr.lines().map(str::trim).filter(|line| !line.is_empty());
    lines()
        .filter(|line| line.starts_with("ERROR:"))
        .last()
        .or_else(|| lines().last())
        .unwrap_or("yt-dlp exited with an error")
        .to_string()
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// HTTP boundary error: a status plus the message the client is allowed to see.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Server-side failures are logged in full and replaced by `generic`.
    pub fn from_proxy(err: ProxyError, generic: &str) -> Self {
        let status = err.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %err, "{}", generic);
            return Self {
                status,
                message: generic.to_string(),
            };
        }

        warn!(status = status.as_u16(), error = %err, "request rejected");
        Self {
            status,
            message: err.to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_video_is_content_unavailable() {
        let err = ProxyError::from_ytdlp_stderr(
            "ERROR: [youtube] abcdefghijk: Private video. Sign in if you've been granted access to this video",
        );
        assert!(matches!(err, ProxyError::ContentUnavailable(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn bot_check_wins_over_sign_in() {
        let err = ProxyError::from_ytdlp_stderr(
            "ERROR: [youtube] abcdefghijk: Sign in to confirm you're not a bot. Use --cookies",
        );
        assert!(matches!(err, ProxyError::UpstreamBlocked(_)));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn http_403_is_upstream_blocked() {
        let err = ProxyError::from_ytdlp_stderr(
            "ERROR: unable to download video data: HTTP Error 403: Forbidden",
        );
        assert!(matches!(err, ProxyError::UpstreamBlocked(_)));
    }

    #[test]
    fn missing_format_is_format_not_found() {
        let err = ProxyError::from_ytdlp_stderr(
            "ERROR: [youtube] abcdefghijk: Requested format is not available. Use --list-formats",
        );
        assert!(matches!(err, ProxyError::FormatNotFound(_)));
    }

    #[test]
    fn unknown_failure_keeps_error_line() {
        let err = ProxyError::from_ytdlp_stderr(
            "WARNING: something\nERROR: Postprocessing: ffmpeg not found\n",
        );
        match err {
            ProxyError::ExtractorUnavailable(detail) => {
                assert_eq!(detail, "ERROR: Postprocessing: ffmpeg not found")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn server_errors_hide_details() {
        let api = ApiError::from_proxy(
            ProxyError::ExtractorUnavailable("/usr/bin/yt-dlp: segfault".into()),
            "Failed to download video",
        );
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message, "Failed to download video");
    }

    #[test]
    fn client_errors_keep_message() {
        let api = ApiError::from_proxy(ProxyError::invalid("Invalid YouTube URL"), "generic");
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.message, "Invalid YouTube URL");
    }

    #[test]
    fn size_limit_message_is_in_megabytes() {
        let err = ProxyError::too_large(50 * 1024 * 1024);
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.to_string(), "The selected format is larger than the 50 MB limit");
    }

    #[test]
    fn quota_maps_to_503() {
        let err = ProxyError::from_ytdlp_stderr(
            "ERROR: The request cannot be completed because you have exceeded your quota.",
        );
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
