//! Telegram transport: command dispatch, notification sink and user lookup.

use crate::commands::{hello_chat_reply, ping_reply, CommandService, HELLO_REPLY};
use crate::notifier::{Notification, NotificationSink, Recipient, SinkError, UserRegistry};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, User};
use teloxide::utils::command::BotCommands;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
}

/// Bot commands.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start,
    #[command(description = "Show help")]
    Help,
    #[command(description = "Get notified about Hetzner auction servers. Usage: /hetzner price=50 vat=19 ram=32")]
    Hetzner(String),
    #[command(description = "Clear all of your Hetzner alerts")]
    HetznerClear,
    #[command(description = "LeetCode daily mentions. Usage: /lock in|out")]
    Lock(String),
    #[command(description = "Show round-trip latency")]
    Ping,
    #[command(description = "Say hello")]
    Hello,
    #[command(description = "Say hello to you")]
    Hellochat,
}

fn telegram_user_id(user: &User) -> i64 {
    user.id.0 as i64
}

fn display_name(user: &User) -> String {
    user.username
        .clone()
        .unwrap_or_else(|| user.full_name())
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
    commands: Arc<CommandService>,
}

impl TelegramBot {
    pub fn new(bot: Bot, commands: Arc<CommandService>) -> Self {
        Self { bot, commands }
    }

    /// Register the command list with Telegram so clients can autocomplete it.
    pub async fn register_commands(&self) -> Result<(), TelegramError> {
        self.bot.set_my_commands(Command::bot_commands()).await?;
        info!(count = Command::bot_commands().len(), "Registered bot commands");
        Ok(())
    }

    /// Run the command dispatcher until Ctrl-C.
    pub async fn run(self: Arc<Self>) {
        let bot = self.bot.clone();
        let handler = Update::filter_message().filter_command::<Command>().endpoint(
            move |bot: Bot, msg: Message, cmd: Command| {
                let this = Arc::clone(&self);
                async move { this.handle_command(bot, msg, cmd).await }
            },
        );

        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    async fn handle_command(
        &self,
        bot: Bot,
        msg: Message,
        cmd: Command,
    ) -> Result<(), TelegramError> {
        debug!(chat_id = msg.chat.id.0, command = ?cmd, "Command received");
        let caller = msg.from.as_ref();

        let reply = match (&cmd, caller) {
            (Command::Start, _) => format!(
                "Welcome to LibreBot!\n\n{}",
                Command::descriptions()
            ),
            (Command::Help, _) => Command::descriptions().to_string(),
            (Command::Ping, _) => {
                let latency = chrono::Utc::now() - msg.date;
                ping_reply(latency.num_milliseconds())
            }
            (Command::Hello, _) => HELLO_REPLY.to_string(),
            (Command::Hetzner(args), Some(user)) => {
                self.commands
                    .register_filter(telegram_user_id(user), args)
                    .await
            }
            (Command::HetznerClear, Some(user)) => {
                self.commands.clear_filters(telegram_user_id(user)).await
            }
            (Command::Lock(action), Some(user)) => {
                let caller = Recipient::new(telegram_user_id(user), display_name(user));
                self.commands.lock(&caller, action).await
            }
            (Command::Hellochat, Some(user)) => hello_chat_reply(&user.first_name),
            (_, None) => "This command must be sent by a user.".to_string(),
        };

        bot.send_message(msg.chat.id, reply)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}

/// Delivers notifications as HTML messages.
#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn ready(&self, target: i64) -> Result<(), SinkError> {
        self.bot.get_chat(ChatId(target)).await.map_err(|e| {
            warn!(chat_id = target, error = %e, "Cannot access notification chat");
            SinkError::Unavailable(target)
        })?;
        Ok(())
    }

    async fn send(&self, target: i64, notification: &Notification) -> Result<(), SinkError> {
        self.bot
            .send_message(ChatId(target), notification.to_html())
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| SinkError::Delivery(e.to_string()))?;
        Ok(())
    }
}

/// Resolves filter owners through their membership in the notification chat.
#[derive(Clone)]
pub struct ChatMemberRegistry {
    bot: Bot,
    chat_id: ChatId,
}

impl ChatMemberRegistry {
    pub fn new(bot: Bot, chat_id: i64) -> Self {
        Self {
            bot,
            chat_id: ChatId(chat_id),
        }
    }
}

#[async_trait]
impl UserRegistry for ChatMemberRegistry {
    async fn resolve(&self, owner_id: i64) -> Option<Recipient> {
        let user_id = UserId(u64::try_from(owner_id).ok()?);
        match self.bot.get_chat_member(self.chat_id, user_id).await {
            Ok(member) if member.kind.is_present() => {
                Some(Recipient::new(owner_id, member.user.full_name()))
            }
            Ok(_) => {
                debug!(owner_id, "Filter owner left the notification chat");
                None
            }
            Err(e) => {
                warn!(owner_id, error = %e, "Failed to look up filter owner");
                None
            }
        }
    }
}
