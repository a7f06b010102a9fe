use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use super::{is_sign_in_required, AudioArtifact, DownloadOutcome};
use crate::config::{DownloadConfig, MAX_FILE_SIZE};
use crate::extractors::{MediaExtractor, QualityTier};
use crate::utils::format_file_size;
use crate::Result;

/// Where scratch directories live and how large an artifact may be
#[derive(Debug, Clone)]
pub struct DownloadPolicy {
    pub max_file_size: u64,
    pub temp_root: Option<PathBuf>,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            temp_root: None,
        }
    }
}

impl From<&DownloadConfig> for DownloadPolicy {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            temp_root: config.temp_dir.clone(),
        }
    }
}

enum Attempt {
    Artifact(PathBuf, u64),
    Missing,
    TooLarge(u64),
}

/// Downloads audio into a private scratch directory, falling back to a lower
/// bitrate when the first result does not fit the upload limit
pub struct AudioFetcher {
    extractor: Arc<dyn MediaExtractor>,
    policy: DownloadPolicy,
}

impl AudioFetcher {
    pub fn new(extractor: Arc<dyn MediaExtractor>, policy: DownloadPolicy) -> Self {
        Self { extractor, policy }
    }

    pub async fn fetch(&self, url: &str) -> DownloadOutcome {
        let scratch = match self.create_scratch() {
            Ok(dir) => dir,
            Err(e) => {
                tracing::error!("Could not create scratch directory: {:#}", e);
                return DownloadOutcome::Failed(format!("{:#}", e));
            }
        };
        tracing::debug!("Scratch directory: {}", scratch.path().display());

        match self.download_into(url, scratch.path()).await {
            Ok(Attempt::Artifact(path, size)) => {
                prune_except(scratch.path(), &path).await;
                tracing::info!("Audio ready: {} ({})", path.display(), format_file_size(size));
                DownloadOutcome::Success(AudioArtifact::new(path, size, scratch))
            }
            Ok(Attempt::TooLarge(size)) => {
                tracing::warn!(
                    "Audio still {} at reduced quality, limit is {}",
                    format_file_size(size),
                    format_file_size(self.policy.max_file_size)
                );
                DownloadOutcome::TooLarge
            }
            Ok(Attempt::Missing) => {
                tracing::error!("yt-dlp finished without producing an audio file for {}", url);
                DownloadOutcome::Failed("no audio file was produced".to_string())
            }
            Err(e) => {
                let message = format!("{:#}", e);
                if is_sign_in_required(&message) {
                    tracing::warn!("Audio download needs sign-in: {}", url);
                    DownloadOutcome::AgeRestricted
                } else {
                    tracing::error!("Error downloading audio: {}", message);
                    DownloadOutcome::Failed(message)
                }
            }
        }
    }

    fn create_scratch(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ytmusic-");

        match &self.policy.temp_root {
            Some(root) => {
                fs_err::create_dir_all(root)?;
                builder
                    .tempdir_in(root)
                    .with_context(|| format!("Failed to create scratch directory in {}", root.display()))
            }
            None => builder.tempdir().context("Failed to create scratch directory"),
        }
    }

    async fn download_into(&self, url: &str, dir: &Path) -> Result<Attempt> {
        self.extractor.fetch_and_transcode(url, dir, QualityTier::High).await?;

        let Some((path, size)) = find_artifact(dir).await? else {
            return Ok(Attempt::Missing);
        };
        if size <= self.policy.max_file_size {
            return Ok(Attempt::Artifact(path, size));
        }

        tracing::info!(
            "Audio is {} at {}, retrying at {}",
            format_file_size(size),
            QualityTier::High,
            QualityTier::Reduced
        );
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to remove {}", path.display()))?;

        self.extractor.fetch_and_transcode(url, dir, QualityTier::Reduced).await?;

        match find_artifact(dir).await? {
            None => Ok(Attempt::Missing),
            Some((_, size)) if size > self.policy.max_file_size => Ok(Attempt::TooLarge(size)),
            Some((path, size)) => Ok(Attempt::Artifact(path, size)),
        }
    }
}

/// Largest mp3 in `dir`, if any
async fn find_artifact(dir: &Path) -> Result<Option<(PathBuf, u64)>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read {}", dir.display()))?;

    let mut best: Option<(PathBuf, u64)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_mp3 = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
        if !is_mp3 {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        if best.as_ref().map_or(true, |(_, size)| metadata.len() > *size) {
            best = Some((path, metadata.len()));
        }
    }

    Ok(best)
}

/// Remove everything in `dir` except `keep`
async fn prune_except(dir: &Path, keep: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path == keep {
            continue;
        }
        let removed = match entry.file_type().await {
            Ok(kind) if kind.is_dir() => tokio::fs::remove_dir_all(&path).await,
            _ => tokio::fs::remove_file(&path).await,
        };
        if let Err(e) = removed {
            tracing::debug!("Could not remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_artifact_picks_largest_mp3() {
        let dir = TempDir::new().unwrap();
        fs_err::write(dir.path().join("a.mp3"), vec![0u8; 10]).unwrap();
        fs_err::write(dir.path().join("b.mp3"), vec![0u8; 20]).unwrap();
        fs_err::write(dir.path().join("c.webm"), vec![0u8; 50]).unwrap();

        let (path, size) = find_artifact(dir.path()).await.unwrap().unwrap();
        assert_eq!(path, dir.path().join("b.mp3"));
        assert_eq!(size, 20);
    }

    #[tokio::test]
    async fn test_find_artifact_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(find_artifact(dir.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prune_keeps_only_artifact() {
        let dir = TempDir::new().unwrap();
        let keep = dir.path().join("track.mp3");
        fs_err::write(&keep, b"audio").unwrap();
        fs_err::write(dir.path().join("track.webm"), b"video").unwrap();
        fs_err::create_dir(dir.path().join("frags")).unwrap();
        fs_err::write(dir.path().join("frags").join("part-1"), b"x").unwrap();

        prune_except(dir.path(), &keep).await;

        let remaining: Vec<_> = fs_err::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(remaining, vec![keep]);
    }
}
