use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub mod audio;
pub mod metadata;

pub use audio::{AudioFetcher, DownloadPolicy};
pub use metadata::MetadataFetcher;

/// Video information shown to the user and attached to the delivered audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub uploader: String,
    pub duration_secs: u64,
    pub duration_string: String,
    pub thumbnail: Option<String>,
    pub webpage_url: String,
}

/// Result of a metadata lookup
#[derive(Debug)]
pub enum MetadataOutcome {
    Ready(VideoMetadata),
    AgeRestricted,
    Failed(String),
}

/// Result of an audio download
#[derive(Debug)]
pub enum DownloadOutcome {
    Success(AudioArtifact),
    AgeRestricted,
    TooLarge,
    Failed(String),
}

/// A downloaded audio file together with the scratch directory holding it.
///
/// Dropping the artifact removes the scratch directory and the file with it.
#[derive(Debug)]
pub struct AudioArtifact {
    path: PathBuf,
    size: u64,
    scratch: TempDir,
}

impl AudioArtifact {
    pub(crate) fn new(path: PathBuf, size: u64, scratch: TempDir) -> Self {
        Self { path, size, scratch }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }
}

const SIGN_IN_MARKERS: &[&str] = &[
    "sign in to confirm",
    "age-restricted",
    "age restricted",
    "inappropriate for some users",
];

/// Best-effort check for yt-dlp errors that need cookies to get past
pub fn is_sign_in_required(error_text: &str) -> bool {
    let lower = error_text.to_lowercase();
    SIGN_IN_MARKERS.iter().any(|marker| lower.contains(marker))
}
