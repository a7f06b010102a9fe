//! The download pipeline: validate, look up metadata, apply the duration policy,
//! download, deliver, and report every step back to the chat.

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

pub mod sink;

pub use sink::{AudioUpload, ChatSink, MessageRef};

use crate::config::Config;
use crate::download::{
    AudioFetcher, DownloadOutcome, DownloadPolicy, MetadataFetcher, MetadataOutcome, VideoMetadata,
};
use crate::extractors::{is_supported_url, video_id, MediaExtractor};
use crate::guard::JobGuard;
use crate::messages;
use crate::status::Stats;
use crate::utils::truncate_chars;
use crate::{BotError, ExtractionStep};

const TITLE_LIMIT: usize = 64;
const PERFORMER_LIMIT: usize = 32;
const CAPTION_LIMIT: usize = 1024;

/// A link sent by a user
#[derive(Debug, Clone)]
pub struct Request {
    pub request_id: Uuid,
    pub requester_id: String,
    pub chat_id: i64,
    pub url: String,
    pub received_at: DateTime<Utc>,
}

impl Request {
    pub fn new(requester_id: impl Into<String>, chat_id: i64, url: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            requester_id: requester_id.into(),
            chat_id,
            url: url.into(),
            received_at: Utc::now(),
        }
    }
}

/// Pipeline states, in the order a successful run passes through them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Validating,
    FetchingMetadata,
    CheckingPolicy,
    Downloading,
    Delivering,
    Done,
    Rejected,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Validating => "validating",
            Stage::FetchingMetadata => "fetching_metadata",
            Stage::CheckingPolicy => "checking_policy",
            Stage::Downloading => "downloading",
            Stage::Delivering => "delivering",
            Stage::Done => "done",
            Stage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// What the user received
#[derive(Debug, Clone)]
pub struct DeliveredTrack {
    pub metadata: VideoMetadata,
    pub size_bytes: u64,
    pub scratch_dir: PathBuf,
}

/// Summary of one pipeline run
#[derive(Debug)]
pub struct PipelineReport {
    pub request_id: Uuid,
    /// `Done` after delivery was attempted, `Rejected` for every other early exit
    pub stage: Stage,
    pub outcome: Result<DeliveredTrack, BotError>,
}

/// Where a run currently is, kept outside the run so faults can still be reported
struct Progress {
    stage: Stage,
    status: Option<MessageRef>,
}

impl Progress {
    fn enter(&mut self, stage: Stage) {
        tracing::debug!("{} -> {}", self.stage, stage);
        self.stage = stage;
    }
}

pub struct Pipeline {
    config: Config,
    metadata: MetadataFetcher,
    audio: AudioFetcher,
    guard: Arc<JobGuard>,
    stats: Arc<Stats>,
    sink: Arc<dyn ChatSink>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        extractor: Arc<dyn MediaExtractor>,
        sink: Arc<dyn ChatSink>,
        guard: Arc<JobGuard>,
        stats: Arc<Stats>,
    ) -> Self {
        let policy = DownloadPolicy::from(&config.download);
        Self {
            metadata: MetadataFetcher::new(Arc::clone(&extractor)),
            audio: AudioFetcher::new(extractor, policy),
            config,
            guard,
            stats,
            sink,
        }
    }

    pub fn guard(&self) -> &Arc<JobGuard> {
        &self.guard
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Run the whole pipeline for one request. Never panics and never returns early
    /// without telling the user what happened.
    pub async fn handle(&self, request: Request) -> PipelineReport {
        let span = tracing::info_span!(
            "pipeline",
            request_id = %request.request_id,
            requester = %request.requester_id,
            video = %video_id(&request.url).unwrap_or("-"),
        );

        async move {
            let mut progress = Progress {
                stage: Stage::Idle,
                status: None,
            };

            let outcome = match AssertUnwindSafe(self.run(&request, &mut progress))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(panic) => Err(BotError::InternalFault(panic_message(panic.as_ref()))),
            };

            let stage = match &outcome {
                Ok(track) => {
                    tracing::info!(
                        "Delivered \"{}\" ({} bytes) in {}s",
                        track.metadata.title,
                        track.size_bytes,
                        (Utc::now() - request.received_at).num_seconds()
                    );
                    Stage::Done
                }
                Err(e) => {
                    if e.is_fault() {
                        tracing::error!(stage = %progress.stage, "Pipeline fault: {}", e);
                    } else {
                        tracing::info!(stage = %progress.stage, "Request rejected: {}", e);
                    }
                    self.notify(request.chat_id, progress.status, &e.user_message()).await;
                    match e {
                        BotError::DeliveryFailed(_) => Stage::Done,
                        _ => Stage::Rejected,
                    }
                }
            };

            PipelineReport {
                request_id: request.request_id,
                stage,
                outcome,
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: &Request, progress: &mut Progress) -> Result<DeliveredTrack, BotError> {
        progress.enter(Stage::Validating);

        if !self.config.is_allowed(&request.requester_id) {
            return Err(BotError::Unauthorized(request.requester_id.clone()));
        }

        let url = request.url.trim();
        if !is_supported_url(url) {
            return Err(BotError::InvalidInput(truncate_chars(url, 200)));
        }

        // Released when this function returns or unwinds
        let _permit = self
            .guard
            .try_acquire(&request.requester_id)
            .ok_or(BotError::Busy)?;

        let status = self
            .sink
            .send_text(request.chat_id, messages::PROCESSING)
            .await
            .map_err(|e| BotError::InternalFault(format!("Failed to send status message: {:#}", e)))?;
        progress.status = Some(status);

        progress.enter(Stage::FetchingMetadata);
        self.update(status, messages::FETCHING_INFO).await;

        let metadata = match self.metadata.fetch(url).await {
            MetadataOutcome::Ready(metadata) => metadata,
            MetadataOutcome::AgeRestricted => return Err(BotError::AgeRestricted),
            MetadataOutcome::Failed(reason) => {
                return Err(BotError::ExtractionFailed {
                    step: ExtractionStep::Metadata,
                    reason,
                })
            }
        };

        progress.enter(Stage::CheckingPolicy);
        let max_secs = self.config.download.max_duration_secs;
        if metadata.duration_secs > max_secs {
            return Err(BotError::PolicyRejected {
                duration_secs: metadata.duration_secs,
                max_secs,
            });
        }

        progress.enter(Stage::Downloading);
        self.update(status, &messages::track_info(&metadata)).await;

        let artifact = match self.audio.fetch(url).await {
            DownloadOutcome::Success(artifact) => artifact,
            DownloadOutcome::AgeRestricted => return Err(BotError::AgeRestricted),
            DownloadOutcome::TooLarge => return Err(BotError::TooLarge),
            DownloadOutcome::Failed(reason) => {
                return Err(BotError::ExtractionFailed {
                    step: ExtractionStep::Audio,
                    reason,
                })
            }
        };

        progress.enter(Stage::Delivering);
        self.update(status, messages::UPLOADING).await;

        let upload = AudioUpload {
            path: artifact.path(),
            title: truncate_chars(&metadata.title, TITLE_LIMIT),
            performer: truncate_chars(&metadata.uploader, PERFORMER_LIMIT),
            duration_secs: metadata.duration_secs,
            thumbnail: metadata.thumbnail.as_deref(),
            caption: truncate_chars(&messages::caption(&metadata), CAPTION_LIMIT),
        };
        self.sink
            .send_audio(request.chat_id, upload)
            .await
            .map_err(BotError::DeliveryFailed)?;
        self.stats.record_success();

        if let Err(e) = self.sink.delete(status).await {
            tracing::warn!("Could not delete status message: {:#}", e);
        }
        progress.status = None;
        progress.enter(Stage::Done);

        Ok(DeliveredTrack {
            size_bytes: artifact.size(),
            scratch_dir: artifact.scratch_dir().to_path_buf(),
            metadata,
        })
    }

    /// Best-effort edit of the status message
    async fn update(&self, status: MessageRef, text: &str) {
        if let Err(e) = self.sink.edit_text(status, text).await {
            tracing::warn!("Could not update status message: {:#}", e);
        }
    }

    /// Tell the user how the run ended, editing the status message when there is one
    async fn notify(&self, chat_id: i64, status: Option<MessageRef>, text: &str) {
        if let Some(status) = status {
            match self.sink.edit_text(status, text).await {
                Ok(()) => return,
                Err(e) => tracing::warn!("Could not edit status message: {:#}", e),
            }
        }
        if let Err(e) = self.sink.send_text(chat_id, text).await {
            tracing::error!("Could not notify chat {}: {:#}", chat_id, e);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with non-string payload".to_string()
    }
}
