//! Persistence, watchers and the Telegram front end.
//!
//! This crate provides:
//! - SQLite storage for filters, daily challenge state and command cooldowns
//! - The auction and daily challenge watchers
//! - Chat command handling and Telegram delivery

pub mod auction;
pub mod commands;
pub mod config;
pub mod daily;
pub mod db;
pub mod guard;
pub mod notifier;
pub mod store;
pub mod telegram;

pub use auction::{AbortReason, AuctionWatcher, AuctionWatcherConfig, RunOutcome, RunReport};
pub use commands::CommandService;
pub use config::{FilterRequest, FilterRequestError};
pub use daily::{DailyChallengeWatcher, DailyOutcome};
pub use db::{Database, DbError};
pub use guard::RunGuard;
pub use notifier::{Notification, NotificationSink, Recipient, SinkError, UserRegistry};
pub use store::{ChallengeStateStore, FilterStore};
pub use telegram::{ChatMemberRegistry, TelegramBot, TelegramSink};
