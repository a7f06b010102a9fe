//! Telegram transport: commands, the delivery sink, and polling/webhook selection

use anyhow::Context;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;

use crate::config::Config;
use crate::extractors::{MediaExtractor, YtDlpExtractor};
use crate::guard::JobGuard;
use crate::messages;
use crate::pipeline::{AudioUpload, ChatSink, MessageRef, Pipeline, Request};
use crate::status::{self, StatusState, Stats, TransportMode};
use crate::Result;

const WEBHOOK_PATH: &str = "/webhook";

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "explain how to use the bot")]
    Help,
    #[command(description = "show uptime and download counters")]
    Status,
    #[command(description = "about cancelling downloads")]
    Cancel,
}

/// Delivery sink backed by the Telegram Bot API
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatSink for TelegramSink {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<MessageRef> {
        let message = self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(MessageRef {
            chat_id,
            message_id: message.id.0,
        })
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
            .await?;
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> Result<()> {
        self.bot
            .delete_message(ChatId(message.chat_id), MessageId(message.message_id))
            .await?;
        Ok(())
    }

    async fn send_audio(&self, chat_id: i64, audio: AudioUpload<'_>) -> Result<()> {
        // The Bot API only takes uploaded thumbnails, so remote thumbnail URLs are not forwarded
        if let Some(thumbnail) = audio.thumbnail {
            tracing::debug!("Skipping remote thumbnail {}", thumbnail);
        }

        self.bot
            .send_audio(ChatId(chat_id), InputFile::file(audio.path))
            .title(audio.title)
            .performer(audio.performer)
            .duration(u32::try_from(audio.duration_secs).unwrap_or(u32::MAX))
            .caption(audio.caption)
            .await
            .context("Telegram rejected the audio upload")?;
        Ok(())
    }
}

/// Everything the update handlers need
pub struct App {
    pub config: Config,
    pub pipeline: Arc<Pipeline>,
    pub stats: Arc<Stats>,
    pub guard: Arc<JobGuard>,
}

impl App {
    pub fn new(config: Config, bot: Bot, extractor: Arc<dyn MediaExtractor>, mode: TransportMode) -> Self {
        let stats = Stats::new(mode);
        let guard = JobGuard::new();
        let sink: Arc<dyn ChatSink> = Arc::new(TelegramSink::new(bot));
        let pipeline = Arc::new(Pipeline::new(
            config.clone(),
            extractor,
            sink,
            Arc::clone(&guard),
            Arc::clone(&stats),
        ));

        Self {
            config,
            pipeline,
            stats,
            guard,
        }
    }

    pub fn status_state(&self) -> StatusState {
        StatusState::new(Arc::clone(&self.stats), Arc::clone(&self.guard))
    }
}

fn schema() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text))
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command, app: Arc<App>) -> ResponseResult<()> {
    let user_id = requester_id(&msg);
    if !app.config.is_allowed(&user_id) {
        bot.send_message(msg.chat.id, messages::UNAUTHORIZED).await?;
        return Ok(());
    }

    let text = match cmd {
        Command::Start => messages::WELCOME.to_string(),
        Command::Help => messages::HELP.to_string(),
        Command::Status => messages::status_summary(
            app.stats.uptime(),
            app.stats.successful_downloads(),
            app.guard.active_count(),
            app.stats.mode().as_str(),
        ),
        Command::Cancel => messages::CANCEL.to_string(),
    };

    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_text(msg: Message, app: Arc<App>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let request = Request::new(requester_id(&msg), msg.chat.id.0, text);
    let pipeline = Arc::clone(&app.pipeline);

    // Runs detached so later messages from the same chat are not queued behind it
    tokio::spawn(async move {
        pipeline.handle(request).await;
    });

    Ok(())
}

fn requester_id(msg: &Message) -> String {
    msg.from
        .as_ref()
        .map(|user| user.id.0.to_string())
        .unwrap_or_else(|| msg.chat.id.0.to_string())
}

/// Start the bot and run until shutdown
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;
    let token = config.bot.token.clone().unwrap_or_default();

    let mode = if config.server.webhook_url.is_some() {
        TransportMode::Webhook
    } else {
        TransportMode::Polling
    };

    if config.bot.allow_everyone {
        tracing::warn!("allow_everyone is set, every Telegram user can use this bot");
    } else if config.bot.allowed_user_ids.is_empty() {
        tracing::warn!("Allow-list is empty, every request will be refused");
    }
    match &config.download.cookies_file {
        Some(path) if path.exists() => tracing::info!("Cookies file: {}", path.display()),
        Some(path) => tracing::warn!("Cookies file not found: {}", path.display()),
        None => tracing::info!("Cookies file: not configured"),
    }

    let extractor = YtDlpExtractor::from_config(&config.download);
    let bot = Bot::new(token);
    let app = Arc::new(App::new(config.clone(), bot.clone(), Arc::new(extractor), mode));

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![Arc::clone(&app)])
        .enable_ctrlc_handler()
        .build();

    match config.server.webhook_url.as_deref() {
        Some(base) => {
            let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
            let url = webhook_url(base)?;
            tracing::info!("Starting in webhook mode at {} (listening on {})", url, addr);

            let (listener, stop_flag, router) = webhooks::axum_to_router(bot, webhooks::Options::new(addr, url))
                .await
                .context("Failed to register webhook")?;

            let router = if config.server.status_page {
                router.merge(status::router(app.status_state()))
            } else {
                router
            };

            let tcp = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind to {}", addr))?;
            tokio::spawn(async move {
                if let Err(e) = axum::serve(tcp, router).with_graceful_shutdown(stop_flag).await {
                    tracing::error!("Webhook server error: {}", e);
                }
            });

            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        None => {
            tracing::info!("Starting in polling mode");

            if config.server.status_page {
                let state = app.status_state();
                let port = config.server.port;
                tokio::spawn(async move {
                    if let Err(e) = status::serve(state, port).await {
                        tracing::error!("Status page stopped: {:#}", e);
                    }
                });
            }

            dispatcher.dispatch().await;
        }
    }

    tracing::info!("Bot stopped");
    Ok(())
}

/// Webhook endpoint under the configured public base URL
fn webhook_url(base: &str) -> Result<url::Url> {
    let base = url::Url::parse(base).with_context(|| format!("Invalid webhook URL: {}", base))?;
    let path = format!("{}{}", base.path().trim_end_matches('/'), WEBHOOK_PATH);
    let mut url = base;
    url.set_path(&path);
    Ok(url)
}
