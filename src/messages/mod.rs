//! User-facing texts sent to the chat

use crate::download::VideoMetadata;
use crate::utils::{format_uptime, truncate_chars};

pub const WELCOME: &str = "\
🎵 YouTube Music Downloader Bot 🎵

Send me a YouTube Music link and I'll download it for you!

Supported URLs:
• YouTube Music tracks
• YouTube videos (watch, embed, shorts and youtu.be links)

Features:
✅ MP3 audio
✅ Title and artist metadata
✅ Direct Telegram upload

Commands:
/start - Show this message
/help - Get help
/status - Show bot status
/cancel - About cancelling downloads

Simply send a YouTube link to get started!";

pub const HELP: &str = "\
How to use this bot:

1. Copy a YouTube Music or YouTube URL
2. Paste it here
3. Wait for the download to complete
4. Receive the audio file directly in Telegram

Tips:
• Maximum file size: 50MB (Telegram limit)
• For longer videos, lower quality audio is automatically used
• Videos longer than 30 minutes are not accepted
• Age-restricted videos require a cookies file on the server

Need help? Contact the bot administrator.";

pub const CANCEL: &str =
    "A download cannot be cancelled once it has started. It will finish or fail on its own shortly.";

pub const UNAUTHORIZED: &str = "⚠️ You are not authorized to use this bot.";
pub const INVALID_URL: &str = "❌ Please send a valid YouTube or YouTube Music URL.";
pub const BUSY: &str = "⏳ You already have a download in progress. Please wait...";
pub const PROCESSING: &str = "🔍 Processing your request...";
pub const FETCHING_INFO: &str = "📥 Fetching video information...";
pub const METADATA_FAILED: &str = "❌ Could not fetch video information.";
pub const AGE_RESTRICTED: &str =
    "🔞 This video is age-restricted or requires sign-in. A cookies file is required.";
pub const TOO_LARGE: &str = "📁 File is too large (>50MB). Try a shorter video.";
pub const DOWNLOAD_FAILED: &str = "❌ Download failed. Please try again.";
pub const UPLOADING: &str = "📤 Uploading to Telegram...";
pub const GENERIC_ERROR: &str = "❌ An unexpected error occurred. Please try again later.";

/// Rejection for videos over the duration cap
pub fn too_long(max_secs: u64) -> String {
    format!("❌ Video is too long (max {} minutes).", max_secs / 60)
}

/// Progress message shown while the audio is downloading
pub fn track_info(metadata: &VideoMetadata) -> String {
    format!(
        "🎵 Track Info:\n• Title: {}\n• Artist: {}\n• Duration: {}\n\n⬇️ Downloading audio... This may take a moment.",
        truncate_chars(&metadata.title, 100),
        metadata.uploader,
        metadata.duration_string,
    )
}

/// Caption attached to the delivered audio
pub fn caption(metadata: &VideoMetadata) -> String {
    format!("🎵 {}\n👤 {}", metadata.title, metadata.uploader)
}

/// Reply to the /status command
pub fn status_summary(
    uptime: std::time::Duration,
    successful: u64,
    active: usize,
    mode: &str,
) -> String {
    format!(
        "📊 Bot status\n• Uptime: {}\n• Downloads completed: {}\n• Downloads in progress: {}\n• Mode: {}",
        format_uptime(uptime.as_secs()),
        successful,
        active,
        mode,
    )
}
