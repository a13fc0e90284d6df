//! Extras User Bot - Main Entry Point
//!
//! Signs in as a Telegram user account and answers prefixed commands sent
//! by the owner and sudo users.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Input, Password};
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use extras_user_bot::commands::{AppState, CommandHandler};
use extras_user_bot::config::{BotSettings, TelegramConfig};
use extras_user_bot::http::{GitHub, create_client};
use extras_user_bot::plugins::android::DeviceCache;
use extras_user_bot::plugins::misc::updates;
use extras_user_bot::scheduler::{AutoDeleter, DeleteHandle};
use extras_user_bot::storage::DocumentStore;
use extras_user_bot::telegram::{ChatApi, Listeners, RateLimiter, TelegramBot, TelegramError};

/// Telegram userbot with moderation, federation and utility commands.
#[derive(Parser, Debug)]
#[command(name = "extras_bot")]
#[command(about = "Run chat commands from your Telegram account")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Directory for the document store; overrides `DATA_DIR`.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let mut settings = BotSettings::from_env_with_defaults();
    if let Some(dir) = args.data_dir {
        settings.data_dir = dir;
    }

    let bot = TelegramBot::connect(&tg_config)
        .await
        .context("Failed to connect to Telegram")?;

    if !bot.is_authorized().await.context("Failed to check authorization")? {
        authenticate(&bot, &tg_config).await?;
    }

    let me = bot.me().await.context("Failed to fetch the signed-in account")?;
    let owner_id = *settings.owner_id.get_or_insert(me.id);
    info!("Signed in as {} ({})", me.full_name(), me.id);

    let store = DocumentStore::open(settings.data_dir.clone())
        .with_context(|| format!("Failed to open data directory {}", settings.data_dir.display()))?;
    let http = create_client().context("Failed to build HTTP client")?;

    let mut messages = bot.start_updates().context("Failed to start update stream")?;
    let bot = Arc::new(bot);
    let api: Arc<dyn ChatApi> = bot.clone();

    let (deleter, deleter_rx) = DeleteHandle::channel();
    let deleter_task = tokio::spawn(AutoDeleter::new(Arc::clone(&api)).run(deleter_rx));

    let restart = Arc::new(Notify::new());
    let app = Arc::new(AppState {
        api,
        listeners: Arc::new(Listeners::new()),
        deleter: deleter.clone(),
        store,
        github: GitHub::new(http.clone()),
        http,
        owner_id,
        fanout: RateLimiter::new(settings.send_interval()),
        devices: DeviceCache::default(),
        restart: Arc::clone(&restart),
        settings,
    });

    tokio::spawn(updates::init_marker(Arc::clone(&app)));

    let handler = CommandHandler::new(Arc::clone(&app));
    info!("Command prefix: {}", app.settings.command_prefix);
    info!("Bot is running. Use Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            () = restart.notified() => {
                info!("Restart requested, exiting so the supervisor starts the new code");
                break;
            }
            message = messages.recv() => {
                let Some(message) = message else {
                    warn!("Update stream ended");
                    break;
                };
                // Replies awaited by a running command are not commands.
                if app.listeners.offer(&message).await {
                    continue;
                }
                let handler = handler.clone();
                tokio::spawn(async move {
                    if let Some((command, Err(e))) = handler.try_handle(message).await {
                        debug!("{} finished with error: {}", command, e);
                    }
                });
            }
        }
    }

    info!("Shutting down...");
    deleter.shutdown();
    let _ = deleter_task.await;
    bot.disconnect();

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Signs in interactively: phone, login code and, if enabled, 2FA password.
async fn authenticate(bot: &TelegramBot, config: &TelegramConfig) -> Result<()> {
    info!("Authentication required");

    let phone: String = Input::new()
        .with_prompt("Enter your phone number (with country code)")
        .interact_text()?;

    let token = bot
        .request_login_code(&phone, &config.api_hash)
        .await
        .context("Failed to request login code")?;

    info!("Login code sent to your Telegram app");

    let code: String = Input::new()
        .with_prompt("Enter the login code")
        .interact_text()?;

    match bot.sign_in(&token, &code).await {
        Ok(()) => Ok(()),
        Err(TelegramError::PasswordRequired(password_token)) => {
            info!("Two-factor authentication is enabled");
            info!("Password hint: {}", password_token.hint().unwrap_or("no hint"));

            let password: String = Password::new()
                .with_prompt("Enter your 2FA password")
                .interact()?;

            bot.check_password(password_token, &password)
                .await
                .context("2FA authentication failed")?;
            Ok(())
        }
        Err(e) => Err(e).context("Authentication failed"),
    }
}
