#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use ytmusic_bot::config::Config;
use ytmusic_bot::extractors::{MediaExtractor, QualityTier, RawMetadata};
use ytmusic_bot::pipeline::{AudioUpload, ChatSink, MessageRef, Pipeline};
use ytmusic_bot::{JobGuard, Stats, TransportMode};

pub const MIB: u64 = 1024 * 1024;
pub const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// What a fake download attempt leaves behind
#[derive(Debug, Clone)]
pub enum Produce {
    /// An mp3 of this many bytes (sparse, so large sizes are cheap)
    Mp3(u64),
    /// Exit successfully without writing an mp3
    Nothing,
    /// Fail with this stderr text
    Error(String),
    Panic,
}

pub struct FakeExtractor {
    metadata: Result<RawMetadata, String>,
    attempts: Mutex<VecDeque<Produce>>,
    gate: Option<Arc<Notify>>,
    pub metadata_calls: AtomicUsize,
    pub downloads: Mutex<Vec<(PathBuf, QualityTier)>>,
}

impl FakeExtractor {
    pub fn new(duration: f64, attempts: Vec<Produce>) -> Self {
        Self {
            metadata: Ok(track(duration)),
            attempts: Mutex::new(attempts.into()),
            gate: None,
            metadata_calls: AtomicUsize::new(0),
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_metadata(error: &str) -> Self {
        Self {
            metadata: Err(error.to_string()),
            ..Self::new(0.0, Vec::new())
        }
    }

    /// Block metadata lookups until the gate is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn download_tiers(&self) -> Vec<QualityTier> {
        self.downloads.lock().unwrap().iter().map(|(_, tier)| *tier).collect()
    }

    pub fn download_dirs(&self) -> Vec<PathBuf> {
        self.downloads.lock().unwrap().iter().map(|(dir, _)| dir.clone()).collect()
    }
}

pub fn track(duration: f64) -> RawMetadata {
    RawMetadata {
        title: Some("Never Gonna Give You Up".to_string()),
        uploader: Some("Rick Astley".to_string()),
        duration: Some(duration),
        duration_string: None,
        thumbnail: Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg".to_string()),
        webpage_url: Some(URL.to_string()),
    }
}

#[async_trait]
impl MediaExtractor for FakeExtractor {
    async fn fetch_metadata(&self, _url: &str) -> ytmusic_bot::Result<RawMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.metadata.clone().map_err(|e| anyhow::anyhow!(e))
    }

    async fn fetch_and_transcode(
        &self,
        _url: &str,
        dest_dir: &Path,
        tier: QualityTier,
    ) -> ytmusic_bot::Result<()> {
        self.downloads
            .lock()
            .unwrap()
            .push((dest_dir.to_path_buf(), tier));

        let next = self
            .attempts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Produce::Nothing);

        match next {
            Produce::Mp3(size) => {
                // Leftovers yt-dlp would normally produce next to the result
                fs_err::write(dest_dir.join(format!("{}.webp", tier.as_str())), b"thumb")?;
                let file = fs_err::File::create(dest_dir.join(format!("{}.mp3", tier.as_str())))?;
                file.set_len(size)?;
                Ok(())
            }
            Produce::Nothing => Ok(()),
            Produce::Error(text) => Err(anyhow::anyhow!("yt-dlp failed (exit status: 1): {}", text)),
            Produce::Panic => panic!("extractor crashed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Sent { chat_id: i64, text: String },
    Edited { message_id: i32, text: String },
    Deleted { message_id: i32 },
    Audio {
        chat_id: i64,
        title: String,
        performer: String,
        duration_secs: u64,
        caption: String,
        size: u64,
    },
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<SinkEvent>>,
    next_id: AtomicI32,
    pub fail_audio: bool,
}

impl RecordingSink {
    pub fn failing_audio() -> Self {
        Self {
            fail_audio: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Last text the user could see, whether sent or edited in
    pub fn last_text(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|event| match event {
            SinkEvent::Sent { text, .. } | SinkEvent::Edited { text, .. } => Some(text),
            _ => None,
        })
    }

    pub fn audio_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SinkEvent::Audio { .. }))
            .count()
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn send_text(&self, chat_id: i64, text: &str) -> ytmusic_bot::Result<MessageRef> {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.lock().unwrap().push(SinkEvent::Sent {
            chat_id,
            text: text.to_string(),
        });
        Ok(MessageRef { chat_id, message_id })
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> ytmusic_bot::Result<()> {
        self.events.lock().unwrap().push(SinkEvent::Edited {
            message_id: message.message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> ytmusic_bot::Result<()> {
        self.events.lock().unwrap().push(SinkEvent::Deleted {
            message_id: message.message_id,
        });
        Ok(())
    }

    async fn send_audio(&self, chat_id: i64, audio: AudioUpload<'_>) -> ytmusic_bot::Result<()> {
        if self.fail_audio {
            anyhow::bail!("Bad Request: file is too big");
        }
        let size = fs_err::metadata(audio.path)?.len();
        self.events.lock().unwrap().push(SinkEvent::Audio {
            chat_id,
            title: audio.title,
            performer: audio.performer,
            duration_secs: audio.duration_secs,
            caption: audio.caption,
            size,
        });
        Ok(())
    }
}

/// Pipeline wired to fakes, with scratch directories under `temp_root`
pub fn pipeline(
    extractor: Arc<FakeExtractor>,
    sink: Arc<RecordingSink>,
    temp_root: &Path,
    allowed: &[&str],
) -> Pipeline {
    let mut config = Config::default();
    config.bot.allowed_user_ids = allowed.iter().map(|id| id.to_string()).collect();
    config.download.temp_dir = Some(temp_root.to_path_buf());

    Pipeline::new(
        config,
        extractor,
        sink,
        JobGuard::new(),
        Stats::new(TransportMode::Polling),
    )
}

/// Entries left under a scratch root
pub fn leftovers(root: &Path) -> Vec<PathBuf> {
    fs_err::read_dir(root)
        .map(|entries| entries.map(|e| e.unwrap().path()).collect())
        .unwrap_or_default()
}
