//! YouTube Music Bot - a Telegram bot that downloads audio from YouTube links
//!
//! This library provides the download pipeline behind the bot: URL validation, metadata
//! lookup and audio extraction through yt-dlp, a per-user single-flight guard, and the
//! orchestrator that reports every step back to the chat.

pub mod bot;
pub mod cli;
pub mod config;
pub mod download;
pub mod extractors;
pub mod guard;
pub mod messages;
pub mod pipeline;
pub mod status;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use download::{AudioArtifact, DownloadOutcome, MetadataOutcome, VideoMetadata};
pub use extractors::{is_supported_url, MediaExtractor, QualityTier};
pub use guard::{JobGuard, JobPermit};
pub use pipeline::{ChatSink, Pipeline, PipelineReport, Request, Stage};
pub use status::{Stats, TransportMode};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Which extraction call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStep {
    Metadata,
    Audio,
}

impl std::fmt::Display for ExtractionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionStep::Metadata => write!(f, "Metadata"),
            ExtractionStep::Audio => write!(f, "Audio"),
        }
    }
}

/// Every way a pipeline run can end without delivering audio
#[derive(thiserror::Error, Debug)]
pub enum BotError {
    #[error("Invalid URL: {0}")]
    InvalidInput(String),

    #[error("Requester {0} is not on the allow-list")]
    Unauthorized(String),

    #[error("Requester already has a download in progress")]
    Busy,

    #[error("Video is {duration_secs}s long, limit is {max_secs}s")]
    PolicyRejected { duration_secs: u64, max_secs: u64 },

    #[error("Video requires sign-in or age verification")]
    AgeRestricted,

    #[error("Audio exceeds the delivery size limit even at reduced quality")]
    TooLarge,

    #[error("{step} extraction failed: {reason}")]
    ExtractionFailed { step: ExtractionStep, reason: String },

    #[error("Delivery failed: {0:#}")]
    DeliveryFailed(anyhow::Error),

    #[error("Internal fault: {0}")]
    InternalFault(String),
}

impl BotError {
    /// Text shown to the requester for this outcome
    pub fn user_message(&self) -> String {
        match self {
            BotError::InvalidInput(_) => messages::INVALID_URL.to_string(),
            BotError::Unauthorized(_) => messages::UNAUTHORIZED.to_string(),
            BotError::Busy => messages::BUSY.to_string(),
            BotError::PolicyRejected { max_secs, .. } => messages::too_long(*max_secs),
            BotError::AgeRestricted => messages::AGE_RESTRICTED.to_string(),
            BotError::TooLarge => messages::TOO_LARGE.to_string(),
            BotError::ExtractionFailed { step: ExtractionStep::Metadata, .. } => {
                messages::METADATA_FAILED.to_string()
            }
            BotError::ExtractionFailed { step: ExtractionStep::Audio, .. } => {
                messages::DOWNLOAD_FAILED.to_string()
            }
            BotError::DeliveryFailed(_) | BotError::InternalFault(_) => {
                messages::GENERIC_ERROR.to_string()
            }
        }
    }

    /// Faults that are logged with full detail instead of handled as business outcomes
    pub fn is_fault(&self) -> bool {
        matches!(self, BotError::DeliveryFailed(_) | BotError::InternalFault(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_extraction_step_has_its_own_message() {
        let metadata = BotError::ExtractionFailed {
            step: ExtractionStep::Metadata,
            reason: "Video unavailable".to_string(),
        };
        let audio = BotError::ExtractionFailed {
            step: ExtractionStep::Audio,
            reason: "ffmpeg not found".to_string(),
        };
        assert_eq!(metadata.user_message(), messages::METADATA_FAILED);
        assert_eq!(audio.user_message(), messages::DOWNLOAD_FAILED);
        assert!(metadata.to_string().contains("Video unavailable"));
    }

    #[test]
    fn test_faults_get_generic_apology() {
        let delivery = BotError::DeliveryFailed(anyhow::anyhow!("413 Request Entity Too Large"));
        let internal = BotError::InternalFault("panic: boom".to_string());
        assert!(delivery.is_fault() && internal.is_fault());
        assert_eq!(delivery.user_message(), messages::GENERIC_ERROR);
        assert_eq!(internal.user_message(), messages::GENERIC_ERROR);
        assert!(!BotError::Busy.is_fault());
        assert_eq!(BotError::Busy.user_message(), messages::BUSY);
    }
}
