mod chatterbot;
mod config;
mod prompt;
mod relay;
mod transport;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use chatterbot::{ChatBotFactory, ChatSession};
use config::{Config, validate_bot_token};
use relay::{Exit, ImRelay, SmsRelay};
use transport::{Sl4aClient, TelegramConfig, TelegramTransport};

const DEFAULT_CONFIG: &str = "chatrelay.json";

#[derive(Parser)]
#[command(author, version, about = "Relay SMS or instant messages to a chatterbot", long_about = None)]
struct Cli {
    /// Config file (JSON). Defaults are used when chatrelay.json is absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Poll the phone's SMS inbox through the SL4A facade
    Sms,
    /// Answer Telegram messages sent to a bot account
    Im,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log dir {}", log_dir.display()))?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("chatrelay.log"))
        .context("failed to open log file")?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting chatrelay...");

    let provider = match config.provider.clone() {
        Some(p) => p,
        None => prompt::provider()?,
    };
    info!("🤖 {provider} selected");

    let session = ChatBotFactory::new(config.endpoints.clone()).create(&provider)?;

    let result = match cli.mode {
        Mode::Sms => run_sms(&config, session).await,
        Mode::Im => run_im(&config, session).await,
    };

    if let Err(ref e) = result {
        error!("Fatal: {e:#}");
    }
    result
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None if Path::new(DEFAULT_CONFIG).exists() => Ok(Config::load(DEFAULT_CONFIG)?),
        None => Ok(Config::defaults()),
    }
}

async fn run_sms(config: &Config, session: Box<dyn ChatSession>) -> anyhow::Result<()> {
    let sl4a = config.sl4a()?;
    let inbox = Sl4aClient::connect(&sl4a).await?;
    let mut relay = SmsRelay::new(inbox, session, config.sms.relay.clone());

    tokio::select! {
        result = relay.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }
    Ok(())
}

async fn run_im(config: &Config, session: Box<dyn ChatSession>) -> anyhow::Result<()> {
    let token = match config.im.bot_token.clone() {
        Some(token) => token,
        None => {
            let token = prompt::secret("Bot token", config.im.password_entry)?;
            validate_bot_token(&token)?;
            token
        }
    };

    let transport = TelegramTransport::new(TelegramConfig {
        token,
        poll_timeout_secs: config.im.poll_timeout_secs,
        roster: config.im.roster.clone(),
    });
    let mut relay = ImRelay::new(transport, session, config.im.relay);

    tokio::select! {
        result = relay.run() => match result? {
            Exit::CloseRequested => info!("👋 Close command received, shutting down"),
            Exit::Disconnected => info!("Disconnected, shutting down"),
        },
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }
    Ok(())
}
