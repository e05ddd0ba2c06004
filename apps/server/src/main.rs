//! LibreBot - Telegram bot server
//!
//! Watches the Hetzner server auction for user-defined filters, announces
//! the LeetCode daily challenge and serves the chat commands.

mod config;
mod scheduler;

use clap::Parser;
use config::{AppConfig, ConfigError};
use librebot_alerts::{
    AuctionWatcher, AuctionWatcherConfig, ChatMemberRegistry, CommandService, DailyChallengeWatcher,
    Database, DbError, TelegramBot, TelegramSink,
};
use librebot_core::SystemClock;
use librebot_feeds::{FeedError, HetznerFetcher, LeetCodeClient};
use scheduler::run_periodic;
use std::sync::Arc;
use std::time::Duration;
use teloxide::Bot;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// LibreBot CLI
#[derive(Parser, Debug)]
#[command(name = "librebot")]
#[command(about = "Hetzner auction alerts and LeetCode daily announcements for Telegram", long_about = None)]
struct Args {
    /// Log level: trace, debug, info, warn, error (RUST_LOG takes precedence)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Minutes between auction checks
    #[arg(long, default_value_t = 31)]
    auction_interval_mins: u64,

    /// Minutes between daily challenge checks
    #[arg(long, default_value_t = 10)]
    daily_interval_mins: u64,

    /// Seconds to wait between the USD and EUR feed requests
    #[arg(long, default_value_t = 5)]
    fetch_delay_secs: u64,

    /// Run the pollers only, without the command dispatcher
    #[arg(long, default_value_t = false)]
    no_commands: bool,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
    #[error("HTTP client error: {0}")]
    Feed(#[from] FeedError),
    #[error("Signal handling error: {0}")]
    Signal(#[from] std::io::Error),
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn minutes(mins: u64) -> Duration {
    Duration::from_secs(mins.max(1) * 60)
}

async fn run(args: Args) -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    info!("  Hetzner chat: {}", config.hetzner_chat_id);
    match config.leetcode_chat_id {
        Some(chat_id) => info!("  LeetCode chat: {}", chat_id),
        None => info!("  LeetCode chat: not configured, daily poller disabled"),
    }
    info!("  Auction interval: {} min", args.auction_interval_mins);
    info!("  Commands: {}", if args.no_commands { "off" } else { "on" });

    let db = Database::connect(&config.database_url).await?;
    info!("Database ready at {}", config.database_url);

    let bot = Bot::new(&config.telegram_token);
    let clock = Arc::new(SystemClock);
    let sink = Arc::new(TelegramSink::new(bot.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();

    let auction = Arc::new(AuctionWatcher::new(
        Arc::new(db.clone()),
        Arc::new(HetznerFetcher::new()?),
        Arc::new(ChatMemberRegistry::new(bot.clone(), config.hetzner_chat_id)),
        sink.clone(),
        clock.clone(),
        AuctionWatcherConfig {
            target_chat: config.hetzner_chat_id,
            fetch_delay: Duration::from_secs(args.fetch_delay_secs),
        },
    ));
    handles.push(tokio::spawn(run_periodic(
        auction,
        minutes(args.auction_interval_mins),
        shutdown_rx.clone(),
    )));

    if let Some(chat_id) = config.leetcode_chat_id {
        let daily = Arc::new(DailyChallengeWatcher::new(
            Arc::new(LeetCodeClient::new()?),
            Arc::new(db.clone()),
            sink.clone(),
            chat_id,
        ));
        handles.push(tokio::spawn(run_periodic(
            daily,
            minutes(args.daily_interval_mins),
            shutdown_rx.clone(),
        )));
    }

    if args.no_commands {
        info!("Press Ctrl+C to stop...");
        tokio::signal::ctrl_c().await?;
    } else {
        let commands = Arc::new(CommandService::new(
            db.clone(),
            clock.clone(),
            config.leetcode_chat_id.is_some(),
        ));
        let telegram = Arc::new(TelegramBot::new(bot, commands));
        if let Err(e) = telegram.register_commands().await {
            warn!("Failed to register bot commands: {}", e);
        }
        info!("Command dispatcher running, press Ctrl+C to stop...");
        telegram.run().await;
    }

    warn!("Shutdown signal received");
    let _ = shutdown_tx.send(true);
    for handle in handles {
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_level);

    info!("🚀 LibreBot starting...");

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("👋 Shutdown complete");
}
