use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::ProxyError;
use crate::models::video::RawVideoInfo;

/// Flags passed on every call, same as the web front-end always used.
const COMMON_ARGS: [&str; 3] = ["--no-check-certificates", "--no-warnings", "--no-playlist"];

/// What yt-dlp reports when `--max-filesize` makes it skip a download
const MAX_FILESIZE_ABORT: &str = "larger than max-filesize";

/// Thin async wrapper around the `yt-dlp` binary.
///
/// Children are spawned with `kill_on_drop`, so dropping any of these
/// futures (for example when the client disconnects) kills the process.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    base_args: Vec<String>,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
        }
    }

    /// Arguments placed before every invocation, e.g. a script path when
    /// `program` is an interpreter.
    #[cfg(test)]
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn run(&self, args: Vec<String>) -> Result<Output, ProxyError> {
        debug!(program = %self.program.display(), ?args, "running yt-dlp");

        let output = self.command().args(&args).output().await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ProxyError::ExtractorUnavailable(format!(
                    "{} is not installed",
                    self.program.display()
                ))
            } else {
                ProxyError::ExtractorUnavailable(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = ?output.status.code(), stderr = %stderr.trim(), "yt-dlp failed");
            return Err(ProxyError::from_ytdlp_stderr(&stderr));
        }

        Ok(output)
    }

    fn with_common(mut args: Vec<String>) -> Vec<String> {
        args.extend(COMMON_ARGS.iter().map(|a| a.to_string()));
        args
    }

    pub async fn version(&self) -> Result<String, ProxyError> {
        let output = self.run(vec!["--version".to_string()]).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// `--dump-single-json` parsed into [`RawVideoInfo`].
    pub async fn dump_info(&self, url: &str) -> Result<RawVideoInfo, ProxyError> {
        let args = Self::with_common(vec![url.to_string(), "--dump-single-json".to_string()]);
        let output = self.run(args).await?;

        serde_json::from_slice(&output.stdout).map_err(|e| {
            ProxyError::ExtractorUnavailable(format!("unparseable yt-dlp output: {e}"))
        })
    }

    /// Downloads one format to `output_template` and waits for the process
    /// to exit. Returns the final path yt-dlp printed, if any.
    ///
    /// yt-dlp exits 0 when `max_filesize` makes it skip the download; that
    /// case comes back as `TooLarge`.
    pub async fn download(
        &self,
        url: &str,
        format_id: &str,
        output_template: &Path,
        max_filesize: Option<u64>,
    ) -> Result<Option<PathBuf>, ProxyError> {
        let mut args = vec![
            url.to_string(),
            "--format".to_string(),
            format_id.to_string(),
            "--output".to_string(),
            output_template.to_string_lossy().into_owned(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "--no-simulate".to_string(),
        ];
        if let Some(bytes) = max_filesize {
            args.push("--max-filesize".to_string());
            args.push(bytes.to_string());
        }

        let output = self.run(Self::with_common(args)).await?;
        if let Some(limit) = max_filesize.filter(|_| skipped_for_size(&output)) {
            warn!(url, format_id, limit, "yt-dlp skipped an oversized download");
            return Err(ProxyError::too_large(limit));
        }
        Ok(last_line(&output.stdout).map(PathBuf::from))
    }

    /// Resolves the direct media URL of one format (`--get-url`).
    pub async fn media_url(&self, url: &str, format_id: &str) -> Result<String, ProxyError> {
        let args = Self::with_common(vec![
            url.to_string(),
            "--get-url".to_string(),
            "--format".to_string(),
            format_id.to_string(),
        ]);
        let output = self.run(args).await?;

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ProxyError::ExtractorUnavailable("yt-dlp printed no media URL".into()))
    }
}

fn skipped_for_size(output: &Output) -> bool {
    [&output.stdout, &output.stderr]
        .iter()
        .any(|stream| String::from_utf8_lossy(stream).contains(MAX_FILESIZE_ABORT))
}

fn last_line(stdout: &[u8]) -> Option<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
}
