use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::{format_file_size, mask_secret};

/// Telegram's upload limit for bots
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Longest video accepted for download
pub const MAX_DURATION_SECS: u64 = 1800;

const COOKIES_FALLBACK: &str = "cookies.txt";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Telegram bot settings
    pub bot: BotConfig,

    /// Extraction and download limits
    pub download: DownloadConfig,

    /// Transport and status page settings
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Bot API token
    pub token: Option<String>,

    /// Telegram user ids allowed to use the bot; empty admits nobody
    pub allowed_user_ids: Vec<String>,

    /// Skip the allow-list and serve every Telegram user
    pub allow_everyone: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// yt-dlp executable
    pub yt_dlp_path: String,

    /// Netscape cookies file enabling age-restricted content
    pub cookies_file: Option<PathBuf>,

    /// Parent directory for scratch directories (system temp if unset)
    pub temp_dir: Option<PathBuf>,

    /// Largest audio file the bot may upload, in bytes
    pub max_file_size: u64,

    /// Longest video accepted, in seconds
    pub max_duration_secs: u64,

    /// Limit for a single yt-dlp invocation, in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port for the webhook and status server
    pub port: u16,

    /// Externally reachable base URL; selects webhook mode when set
    pub webhook_url: Option<String>,

    /// Serve the HTTP status page
    pub status_page: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            cookies_file: None,
            temp_dir: None,
            max_file_size: MAX_FILE_SIZE,
            max_duration_secs: MAX_DURATION_SECS,
            timeout_secs: 600,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8443,
            webhook_url: None,
            status_page: true,
        }
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub token: Option<String>,
    pub allowed_user_ids: Option<Vec<String>>,
    pub allow_everyone: bool,
    pub webhook_url: Option<String>,
    pub port: Option<u16>,
    pub cookies_file: Option<PathBuf>,
    pub yt_dlp_path: Option<String>,
}

impl Config {
    /// Load configuration from file or fall back to defaults
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            Self::default()
        };

        if config.download.cookies_file.is_none() && Path::new(COOKIES_FALLBACK).exists() {
            config.download.cookies_file = Some(PathBuf::from(COOKIES_FALLBACK));
        }

        Ok(config)
    }

    /// Parse a YAML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("ytmusic-bot").join("config.yaml"))
    }

    /// Apply command line and environment values on top of the file
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(token) = overrides.token {
            self.bot.token = Some(token);
        }
        if let Some(ids) = overrides.allowed_user_ids {
            self.bot.allowed_user_ids = ids
                .into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect();
        }
        if overrides.allow_everyone {
            self.bot.allow_everyone = true;
        }
        if let Some(url) = overrides.webhook_url.filter(|u| !u.trim().is_empty()) {
            self.server.webhook_url = Some(url);
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(cookies) = overrides.cookies_file {
            self.download.cookies_file = Some(cookies);
        }
        if let Some(path) = overrides.yt_dlp_path {
            self.download.yt_dlp_path = path;
        }
    }

    /// Validate configuration before starting the bot
    pub fn validate(&self) -> Result<()> {
        match self.bot.token.as_deref() {
            Some(token) if !token.trim().is_empty() => {}
            _ => anyhow::bail!("TELEGRAM_TOKEN must be configured"),
        }

        if let Some(webhook) = &self.server.webhook_url {
            let parsed = url::Url::parse(webhook)
                .map_err(|_| anyhow::anyhow!("Invalid webhook URL: {}", webhook))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("Webhook URL must use HTTP or HTTPS protocol");
            }
        }

        if self.download.max_file_size == 0 {
            anyhow::bail!("max_file_size must be greater than zero");
        }
        if self.download.max_duration_secs == 0 {
            anyhow::bail!("max_duration_secs must be greater than zero");
        }

        Ok(())
    }

    /// Membership check against the allow-list
    pub fn is_allowed(&self, user_id: &str) -> bool {
        self.bot.allow_everyone || self.bot.allowed_user_ids.iter().any(|id| id == user_id)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!(
            "  Bot Token: {}",
            self.bot.token.as_deref().map(mask_secret).unwrap_or_else(|| "(not set)".to_string())
        );
        if self.bot.allow_everyone {
            println!("  Allowed Users: everyone");
        } else if self.bot.allowed_user_ids.is_empty() {
            println!("  Allowed Users: nobody");
        } else {
            println!("  Allowed Users: {}", self.bot.allowed_user_ids.join(", "));
        }
        println!("  yt-dlp: {}", self.download.yt_dlp_path);
        match &self.download.cookies_file {
            Some(path) => println!("  Cookies File: {}", path.display()),
            None => println!("  Cookies File: (none)"),
        }
        println!("  Max File Size: {}", format_file_size(self.download.max_file_size));
        println!("  Max Duration: {}s", self.download.max_duration_secs);
        match &self.server.webhook_url {
            Some(url) => println!("  Mode: webhook ({})", url),
            None => println!("  Mode: polling"),
        }
        println!("  Port: {}", self.server.port);
    }
}
