use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;

#[derive(Parser)]
#[command(
    name = "ytmusic-bot",
    about = "YouTube Music Bot - Send a YouTube link on Telegram, get the MP3 back",
    version,
    long_about = "A Telegram bot that downloads audio from YouTube and YouTube Music links with yt-dlp and uploads it back to the chat. Runs with long polling, or with a webhook when a public URL is configured."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the bot
    Run(RunArgs),

    /// Check that yt-dlp and ffmpeg are installed
    Check,

    /// Check whether a link would be accepted by the bot
    Validate {
        /// YouTube or YouTube Music URL
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write the default configuration file
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Comma separated Telegram user ids allowed to use the bot
    #[arg(long, env = "ALLOWED_USER_IDS", value_delimiter = ',')]
    pub allowed_users: Option<Vec<String>>,

    /// Serve every Telegram user regardless of the allow-list
    #[arg(long, env = "ALLOW_EVERYONE")]
    pub allow_everyone: bool,

    /// Public base URL; enables webhook mode
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Port for the webhook and status server
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Cookies file for age-restricted videos
    #[arg(long, env = "COOKIES_FILE", value_name = "FILE")]
    pub cookies: Option<PathBuf>,

    /// Path to the yt-dlp executable
    #[arg(long, env = "YT_DLP_PATH")]
    pub yt_dlp: Option<String>,
}

impl From<RunArgs> for Overrides {
    fn from(args: RunArgs) -> Self {
        Self {
            token: args.token,
            allowed_user_ids: args.allowed_users,
            allow_everyone: args.allow_everyone,
            webhook_url: args.webhook_url,
            port: args.port,
            cookies_file: args.cookies,
            yt_dlp_path: args.yt_dlp,
        }
    }
}
