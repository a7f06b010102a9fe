use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use super::{MediaExtractor, QualityTier, RawMetadata};
use crate::config::DownloadConfig;
use crate::Result;

/// YouTube metadata and audio extraction using yt-dlp
pub struct YtDlpExtractor {
    yt_dlp_path: String,
    cookies_file: Option<PathBuf>,
    timeout: Duration,
}

impl YtDlpExtractor {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            cookies_file: None,
            timeout: Duration::from_secs(600),
        }
    }

    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            yt_dlp_path: config.yt_dlp_path.clone(),
            cookies_file: config.cookies_file.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--no-progress".to_string(),
        ];
        if let Some(cookies) = &self.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().into_owned());
        }
        args
    }

    /// Run yt-dlp to completion, turning a non-zero exit into an error carrying its stderr
    async fn run(&self, args: Vec<String>) -> Result<Output> {
        let child = Command::new(&self.yt_dlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.yt_dlp_path))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| anyhow::anyhow!("yt-dlp timed out after {}s", self.timeout.as_secs()))?
            .context("Failed to wait for yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed ({}): {}", output.status, error.trim());
        }

        Ok(output)
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn fetch_metadata(&self, url: &str) -> Result<RawMetadata> {
        tracing::debug!("Extracting video info for: {}", url);

        let mut args = self.base_args();
        args.extend(["--dump-json".to_string(), "--skip-download".to_string()]);
        args.push(url.to_string());

        let output = self.run(args).await?;
        let info: RawMetadata = serde_json::from_slice(&output.stdout)
            .context("Failed to parse yt-dlp metadata")?;

        Ok(info)
    }

    async fn fetch_and_transcode(&self, url: &str, dest_dir: &Path, tier: QualityTier) -> Result<()> {
        tracing::debug!("Downloading {} audio for: {}", tier, url);

        let template = match tier {
            QualityTier::High => "%(title)s.%(ext)s",
            QualityTier::Reduced => "compressed_%(title)s.%(ext)s",
        };
        let output_template = dest_dir.join(template);

        let mut args = self.base_args();
        args.extend(
            [
                "--format",
                "bestaudio/best",
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
            ]
            .map(String::from),
        );
        args.push(format!("{}K", tier.bitrate_kbps()));
        // Mono keeps long tracks under the upload limit
        args.push("--postprocessor-args".to_string());
        args.push("ffmpeg:-ac 1".to_string());
        args.push("--restrict-filenames".to_string());
        args.push("--output".to_string());
        args.push(output_template.to_string_lossy().into_owned());
        args.push(url.to_string());

        self.run(args).await?;
        Ok(())
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new()
    }
}
