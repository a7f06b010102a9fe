use async_trait::async_trait;
use std::path::Path;

use crate::Result;

/// A message the bot sent earlier and may edit or delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

/// Audio file plus the tags shown by the chat client
#[derive(Debug, Clone)]
pub struct AudioUpload<'a> {
    pub path: &'a Path,
    pub title: String,
    pub performer: String,
    pub duration_secs: u64,
    pub thumbnail: Option<&'a str>,
    pub caption: String,
}

/// The messaging platform as seen by the pipeline
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<MessageRef>;

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<()>;

    async fn delete(&self, message: MessageRef) -> Result<()>;

    async fn send_audio(&self, chat_id: i64, audio: AudioUpload<'_>) -> Result<()>;
}
