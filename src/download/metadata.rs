use std::sync::Arc;

use super::{is_sign_in_required, MetadataOutcome, VideoMetadata};
use crate::extractors::{MediaExtractor, RawMetadata};
use crate::utils::format_duration_string;

/// Looks up video information without downloading media
pub struct MetadataFetcher {
    extractor: Arc<dyn MediaExtractor>,
}

impl MetadataFetcher {
    pub fn new(extractor: Arc<dyn MediaExtractor>) -> Self {
        Self { extractor }
    }

    pub async fn fetch(&self, url: &str) -> MetadataOutcome {
        match self.extractor.fetch_metadata(url).await {
            Ok(raw) => MetadataOutcome::Ready(build_metadata(raw, url)),
            Err(e) => {
                let message = format!("{:#}", e);
                if is_sign_in_required(&message) {
                    tracing::warn!("Metadata lookup needs sign-in: {}", url);
                    MetadataOutcome::AgeRestricted
                } else {
                    tracing::error!("Error extracting video info: {}", message);
                    MetadataOutcome::Failed(message)
                }
            }
        }
    }
}

fn build_metadata(raw: RawMetadata, url: &str) -> VideoMetadata {
    let duration_secs = raw
        .duration
        .filter(|d| d.is_finite() && *d > 0.0)
        // Round up so a fractional second past the cap still counts
        .map(|d| d.ceil() as u64)
        .unwrap_or(0);

    let duration_string = raw
        .duration_string
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format_duration_string(duration_secs));

    VideoMetadata {
        title: raw.title.filter(|s| !s.is_empty()).unwrap_or_else(|| "Unknown Title".to_string()),
        uploader: raw
            .uploader
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown Artist".to_string()),
        duration_secs,
        duration_string,
        thumbnail: raw.thumbnail.filter(|s| !s.is_empty()),
        webpage_url: raw.webpage_url.unwrap_or_else(|| url.to_string()),
    }
}
