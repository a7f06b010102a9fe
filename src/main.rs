use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ytmusic_bot::cli::{Cli, Commands};
use ytmusic_bot::config::{Config, Overrides};
use ytmusic_bot::{bot, extractors, utils};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Run(args) => {
            let mut config = Config::load().await?;
            config.apply(Overrides::from(args));

            // Check for required external dependencies (non-fatal in Docker)
            let missing_deps = utils::check_dependencies(&config.download.yt_dlp_path).await;
            for dep in missing_deps {
                tracing::warn!("Missing dependency: {}", dep);
            }

            tracing::info!("🤖 YouTube Music Downloader Bot is starting...");
            bot::run(config).await?;
        }
        Commands::Check => {
            let config = Config::load().await?;
            let missing_deps = utils::check_dependencies(&config.download.yt_dlp_path).await;
            if missing_deps.is_empty() {
                println!("✅ All external tools are available");
            } else {
                println!("⚠️  Missing tools:");
                for dep in &missing_deps {
                    println!("   • {}", dep);
                }
                anyhow::bail!("{} required tool(s) missing", missing_deps.len());
            }
        }
        Commands::Validate { url } => match extractors::video_id(&url) {
            Some(id) => println!("✅ Supported link (video id {})", id),
            None => anyhow::bail!("Not a supported YouTube or YouTube Music link: {}", url.trim()),
        },
        Commands::Config { show, init } => {
            if init {
                let path = Config::default().save().await?;
                println!("Default configuration written to: {}", path.display());
            } else if show {
                Config::load().await?.display();
            } else {
                println!("Edit the config file to change settings:");
                println!("  {}", Config::config_path()?.display());
                println!("Environment variables (TELEGRAM_TOKEN, ALLOWED_USER_IDS, WEBHOOK_URL, PORT, COOKIES_FILE) override it.");
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose { "ytmusic_bot=debug" } else { "ytmusic_bot=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
