use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod youtube;

pub use youtube::YtDlpExtractor;

use crate::Result;

/// Metadata as reported by the extraction tool, before defaults are applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMetadata {
    pub title: Option<String>,
    pub uploader: Option<String>,
    /// Duration in seconds; yt-dlp reports fractional values for some formats
    pub duration: Option<f64>,
    pub duration_string: Option<String>,
    pub thumbnail: Option<String>,
    pub webpage_url: Option<String>,
}

/// Audio bitrate presets, tried in order until the artifact fits the size cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    High,
    Reduced,
}

impl QualityTier {
    pub fn bitrate_kbps(&self) -> u32 {
        match self {
            QualityTier::High => 192,
            QualityTier::Reduced => 128,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::High => "high",
            QualityTier::Reduced => "reduced",
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} kbps)", self.as_str(), self.bitrate_kbps())
    }
}

/// The external tool that resolves a video URL into metadata or a transcoded audio file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Look up metadata without downloading any media
    async fn fetch_metadata(&self, url: &str) -> Result<RawMetadata>;

    /// Download and transcode the audio of `url` into `dest_dir`
    async fn fetch_and_transcode(&self, url: &str, dest_dir: &Path, tier: QualityTier) -> Result<()>;
}

static YOUTUBE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.|m\.)?(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|embed/|v/|shorts/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[?&#/].*)?$",
    )
    .expect("youtube url pattern is valid")
});

static YOUTUBE_MUSIC_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://music\.youtube\.com/watch\?v=([A-Za-z0-9_-]{11})(?:[&#].*)?$")
        .expect("youtube music url pattern is valid")
});

/// Check whether text is a YouTube or YouTube Music video link
pub fn is_supported_url(text: &str) -> bool {
    video_id(text).is_some()
}

/// Extract the 11-character video id from a supported link
pub fn video_id(text: &str) -> Option<&str> {
    let text = text.trim();
    YOUTUBE_URL
        .captures(text)
        .or_else(|| YOUTUBE_MUSIC_URL.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_standard_forms() {
        assert!(is_supported_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_supported_url("https://music.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_supported_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_supported_url("https://www.youtube.com/embed/dQw4w9WgXcQ"));
        assert!(is_supported_url("https://youtube.com/shorts/dQw4w9WgXcQ"));
        assert!(is_supported_url("youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_supported_url("https://m.youtube.com/watch?v=dQw4w9WgXcQ"));
    }

    #[test]
    fn test_accepts_extra_query_parameters() {
        assert!(is_supported_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s"));
        assert!(is_supported_url("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"));
        assert!(is_supported_url("https://youtu.be/dQw4w9WgXcQ?si=abcdef"));
        assert!(is_supported_url("https://music.youtube.com/watch?v=dQw4w9WgXcQ&list=RDAMVM"));
        assert!(is_supported_url("  https://youtu.be/dQw4w9WgXcQ\n"));
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(!is_supported_url("not a url"));
        assert!(!is_supported_url("https://youtube.com/watch?v=short"));
        assert!(!is_supported_url("https://youtube.com/watch?v=dQw4w9WgXcQX"));
        assert!(!is_supported_url("https://youtube.com/watch"));
        assert!(!is_supported_url("https://youtu.be/"));
        assert!(!is_supported_url("https://youtube.com/channel/UCuAXFkgsw1L7xaCfnd5JJOw"));
        assert!(!is_supported_url("https://vimeo.com/dQw4w9WgXcQ"));
        assert!(!is_supported_url("ftp://youtu.be/dQw4w9WgXcQ"));
        assert!(!is_supported_url(""));
    }

    #[test]
    fn test_video_id() {
        assert_eq!(video_id("https://youtu.be/dQw4w9WgXcQ"), Some("dQw4w9WgXcQ"));
        assert_eq!(
            video_id("https://music.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(video_id("not a url"), None);
    }

    #[test]
    fn test_quality_tiers() {
        assert!(QualityTier::High.bitrate_kbps() > QualityTier::Reduced.bitrate_kbps());
        assert_eq!(QualityTier::Reduced.to_string(), "reduced (128 kbps)");
    }
}
