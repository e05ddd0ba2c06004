//! Chat command logic, independent of the Telegram transport.
//!
//! Every handler returns the HTML reply to send back; storage errors are
//! logged and turned into a generic failure message.

use crate::config::{FilterRequest, COMMAND_COOLDOWN_SECS, HETZNER_USAGE, MAX_FILTERS_PER_USER};
use crate::db::Database;
use crate::notifier::Recipient;
use librebot_core::{Clock, Currency};
use std::sync::Arc;
use teloxide::utils::html::escape;
use tracing::{debug, error, info};

const HETZNER_COMMAND: &str = "hetzner";

/// Handles commands against the database.
pub struct CommandService {
    db: Database,
    clock: Arc<dyn Clock>,
    /// Whether a daily challenge chat is configured
    daily_enabled: bool,
}

impl CommandService {
    pub fn new(db: Database, clock: Arc<dyn Clock>, daily_enabled: bool) -> Self {
        Self {
            db,
            clock,
            daily_enabled,
        }
    }

    /// `/hetzner key=value ...`
    pub async fn register_filter(&self, owner_id: i64, args: &str) -> String {
        let request = match FilterRequest::parse(args) {
            Ok(request) => request,
            Err(e) => return format!("❌ {}\n\n{}", escape(&e.to_string()), HETZNER_USAGE),
        };

        let now = self.clock.now_secs();
        match self
            .db
            .try_acquire_cooldown(owner_id, HETZNER_COMMAND, now, COMMAND_COOLDOWN_SECS)
            .await
        {
            Ok(None) => {}
            Ok(Some(remaining)) => {
                return format!(
                    "Please wait {} more second(s) before using this command again.",
                    remaining
                )
            }
            Err(e) => {
                error!(owner_id, error = %e, "Cooldown check failed");
                return database_unavailable();
            }
        }
        if let Err(e) = self.db.purge_expired_cooldowns(now).await {
            debug!(error = %e, "Failed to purge expired cooldowns");
        }

        match self.db.count_filters_for_owner(owner_id).await {
            Ok(count) if count >= MAX_FILTERS_PER_USER => {
                return format!(
                    "❌ You already have {} active Hetzner alert configurations.",
                    MAX_FILTERS_PER_USER
                )
            }
            Ok(_) => {}
            Err(e) => {
                error!(owner_id, error = %e, "Failed to count filters");
                return database_unavailable();
            }
        }

        let currency = request.currency();
        let criteria = request.into_criteria();
        match self.db.insert_filter(owner_id, currency, &criteria, now).await {
            Ok(filter_id) => {
                info!(owner_id, filter_id, currency = %currency, "Hetzner filter registered");
                format_registration(currency, &criteria.describe(currency))
            }
            Err(e) => {
                error!(owner_id, error = %e, "Error saving Hetzner filter");
                "❌ There was an error saving your configuration. Please try again.".to_string()
            }
        }
    }

    /// `/hetzner_clear`
    pub async fn clear_filters(&self, owner_id: i64) -> String {
        match self.db.delete_filters_for_owner(owner_id).await {
            Ok(0) => "ℹ️ <b>No Configurations Found</b>\n\
                      You didn't have any active Hetzner alert configurations to clear."
                .to_string(),
            Ok(deleted) => {
                info!(owner_id, deleted, "Hetzner filters cleared");
                format!(
                    "✅ <b>Configurations Cleared!</b>\n\
                     Successfully deleted {} of your Hetzner alert configuration(s).",
                    deleted
                )
            }
            Err(e) => {
                error!(owner_id, error = %e, "Error clearing Hetzner filters");
                "❌ There was an error trying to clear your configurations. Please try again."
                    .to_string()
            }
        }
    }

    /// `/lock in|out`
    pub async fn lock(&self, caller: &Recipient, action: &str) -> String {
        if !self.daily_enabled {
            return "❌ LeetCode daily notifications are not configured by the bot admin."
                .to_string();
        }

        let result = match action.trim().to_lowercase().as_str() {
            "in" => self
                .db
                .add_subscriber(caller.user_id, &caller.display_name)
                .await
                .map(|added| {
                    if added {
                        "✅ <b>Subscribed!</b>\n\
                         You will now be mentioned in LeetCode daily problem notifications."
                    } else {
                        "ℹ️ <b>Already Subscribed</b>\n\
                         You are already receiving LeetCode daily problem notifications."
                    }
                }),
            "out" => self.db.remove_subscriber(caller.user_id).await.map(|removed| {
                if removed {
                    "✅ <b>Unsubscribed!</b>\n\
                     You will no longer be mentioned in LeetCode daily problem notifications."
                } else {
                    "ℹ️ <b>Not Subscribed</b>\n\
                     You are not subscribed to LeetCode daily problem notifications."
                }
            }),
            _ => return "Usage: /lock in|out".to_string(),
        };

        match result {
            Ok(reply) => reply.to_string(),
            Err(e) => {
                error!(user_id = caller.user_id, error = %e, "Error updating daily subscription");
                "❌ There was an error updating your subscription. Please try again.".to_string()
            }
        }
    }
}

fn database_unavailable() -> String {
    "Database connection is not available. Please try again later.".to_string()
}

fn format_registration(currency: Currency, criteria: &[String]) -> String {
    let summary = if criteria.is_empty() {
        "Any server (no specific criteria set).".to_string()
    } else {
        criteria
            .iter()
            .map(|line| format!("&gt; {}", escape(line)))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "✅ <b>Hetzner Alert Configured!</b>\n\
         I will notify you when a server matching your criteria is found in the Hetzner Server Auction.\n\n\
         <b>Your Criteria ({})</b>\n{}\n\n\
         <i>Configs are valid for 90 days. Max {} configs per user.</i>",
        currency, summary, MAX_FILTERS_PER_USER
    )
}

/// `/ping` reply for a given round-trip latency.
pub fn ping_reply(latency_ms: i64) -> String {
    format!("Pong! 🏓\nRoundtrip latency: {}ms", latency_ms.max(0))
}

/// `/hellochat` reply.
pub fn hello_chat_reply(name: &str) -> String {
    format!("Hello Chat, {}!", escape(name))
}

pub const HELLO_REPLY: &str = "Hello chat!";
