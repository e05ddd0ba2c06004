//! Application configuration.

use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://librebot.db";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("{name} must be a numeric Telegram chat id, got `{value}`")]
    InvalidChatId { name: &'static str, value: String },
}

/// Settings read from the environment.
#[derive(Clone)]
pub struct AppConfig {
    pub telegram_token: String,
    /// Chat that receives auction alerts and resolves filter owners
    pub hetzner_chat_id: i64,
    /// Chat for daily challenge announcements; the poller is off without it
    pub leetcode_chat_id: Option<i64>,
    pub database_url: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("telegram_token", &"<redacted>")
            .field("hetzner_chat_id", &self.hetzner_chat_id)
            .field("leetcode_chat_id", &self.leetcode_chat_id)
            .field("database_url", &self.database_url)
            .finish()
    }
}

fn parse_chat_id(name: &'static str, value: String) -> Result<i64, ConfigError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidChatId { name, value })
}

impl AppConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let telegram_token =
            get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let hetzner_chat_id = get("HETZNER_NOTIFICATIONS_CHAT_ID")
            .ok_or(ConfigError::Missing("HETZNER_NOTIFICATIONS_CHAT_ID"))
            .and_then(|v| parse_chat_id("HETZNER_NOTIFICATIONS_CHAT_ID", v))?;

        let leetcode_chat_id = get("LEETCODE_NOTIFICATIONS_CHAT_ID")
            .map(|v| parse_chat_id("LEETCODE_NOTIFICATIONS_CHAT_ID", v))
            .transpose()?;

        let database_url =
            get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        Ok(Self {
            telegram_token,
            hetzner_chat_id,
            leetcode_chat_id,
            database_url,
        })
    }
}
