// settings
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::controllers::extractor::ExtractorBackend;
use crate::models::download::FileSizeLimits;

pub static SETTINGS: Lazy<Settings> =
    Lazy::new(|| Settings::from_lookup(|key| env::var(key).ok()));

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_VIDEO_MB: u64 = 100;
const DEFAULT_MAX_AUDIO_MB: u64 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Dev,
    Prod,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub mode: Mode,
    pub port: u16,
    pub backend_url: String,
    /// Only origin allowed by CORS when set; any origin otherwise
    pub frontend_url: Option<String>,
    pub ytdlp_path: PathBuf,
    pub extractor_backend: ExtractorBackend,
    pub download_dir: PathBuf,
    pub limits: FileSizeLimits,
    pub log_level: String,
    /// Malformed values that fell back to defaults. Settings load before the
    /// subscriber exists, so these are logged by [`Settings::log_summary`].
    pub warnings: Vec<String>,
}

/// Parses `key` when present, keeping `default` and noting a warning when the
/// value is malformed.
fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    warnings: &mut Vec<String>,
    key: &str,
    default: T,
) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key).map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty()) {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warnings.push(format!("Ignoring invalid {key}={raw:?}: {e}"));
            default
        }),
        None => default,
    }
}

impl Settings {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let present = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mode = match present("MODE") {
            Some(mode) if mode.to_lowercase() == "prod" => Mode::Prod,
            _ => Mode::Dev,
        };
        let mut warnings = Vec::new();
        let port = parse_or(&lookup, &mut warnings, "PORT", DEFAULT_PORT);
        let extractor_backend = parse_or(
            &lookup,
            &mut warnings,
            "EXTRACTOR_BACKEND",
            ExtractorBackend::default(),
        );
        let limits = FileSizeLimits::from_megabytes(
            parse_or(&lookup, &mut warnings, "MAX_VIDEO_FILESIZE_MB", DEFAULT_MAX_VIDEO_MB),
            parse_or(&lookup, &mut warnings, "MAX_AUDIO_FILESIZE_MB", DEFAULT_MAX_AUDIO_MB),
        );

        let (backend_url, frontend_url, log_level) = match mode {
            Mode::Dev => (
                present("BACKEND_URL").unwrap_or_else(|| format!("http://localhost:{port}")),
                present("FRONTEND_URL").or_else(|| Some("http://localhost:3000".to_string())),
                present("LOG_LEVEL").unwrap_or_else(|| "debug".to_string()),
            ),
            Mode::Prod => (
                present("BACKEND_URL").unwrap_or_else(|| format!("http://0.0.0.0:{port}")),
                present("FRONTEND_URL"),
                present("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            ),
        };

        Settings {
            mode,
            port,
            backend_url,
            frontend_url,
            ytdlp_path: present("YTDLP_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("yt-dlp")),
            extractor_backend,
            download_dir: present("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| env::temp_dir().join("yt-proxy")),
            limits,
            log_level,
            warnings,
        }
    }

    /// Logs the effective configuration, and anything that was ignored while
    /// loading it, once tracing is up.
    pub fn log_summary(&self) {
        for warning in &self.warnings {
            warn!("{}", warning);
        }
        info!(
            mode = ?self.mode,
            port = self.port,
            backend = ?self.extractor_backend,
            ytdlp = %self.ytdlp_path.display(),
            download_dir = %self.download_dir.display(),
            frontend = ?self.frontend_url,
            "Settings loaded"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn dev_defaults() {
        let s = settings(&[]);
        assert_eq!(s.mode, Mode::Dev);
        assert_eq!(s.port, 8000);
        assert_eq!(s.backend_url, "http://localhost:8000");
        assert_eq!(s.frontend_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(s.ytdlp_path, PathBuf::from("yt-dlp"));
        assert_eq!(s.extractor_backend, ExtractorBackend::Process);
        assert_eq!(s.limits, FileSizeLimits::from_megabytes(100, 50));
        assert_eq!(s.log_level, "debug");
        assert!(s.warnings.is_empty());
    }

    #[test]
    fn prod_reads_environment() {
        let s = settings(&[
            ("MODE", "PROD"),
            ("PORT", "9100"),
            ("EXTRACTOR_BACKEND", "direct"),
            ("DOWNLOAD_DIR", "/srv/downloads"),
            ("MAX_AUDIO_FILESIZE_MB", "0"),
        ]);
        assert_eq!(s.mode, Mode::Prod);
        assert_eq!(s.port, 9100);
        assert_eq!(s.frontend_url, None);
        assert_eq!(s.extractor_backend, ExtractorBackend::Direct);
        assert_eq!(s.download_dir, PathBuf::from("/srv/downloads"));
        assert_eq!(s.limits.audio_bytes, None);
        assert_eq!(s.log_level, "info");
    }

    #[test]
    fn malformed_values_fall_back() {
        let s = settings(&[
            ("PORT", "eighty"),
            ("EXTRACTOR_BACKEND", "ffmpeg"),
            ("MAX_VIDEO_FILESIZE_MB", "-3"),
        ]);
        assert_eq!(s.port, 8000);
        assert_eq!(s.extractor_backend, ExtractorBackend::Process);
        assert_eq!(s.limits.video_bytes, Some(100 * 1024 * 1024));
    }

    #[test]
    fn malformed_values_are_kept_for_logging() {
        let s = settings(&[("PORT", "eighty"), ("MAX_AUDIO_FILESIZE_MB", "lots")]);
        assert_eq!(s.warnings.len(), 2);
        assert!(s.warnings[0].starts_with("Ignoring invalid PORT=\"eighty\""));
        assert!(s.warnings[1].starts_with("Ignoring invalid MAX_AUDIO_FILESIZE_MB=\"lots\""));
    }
}
