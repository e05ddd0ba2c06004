//! Daily coding challenge watcher.

use crate::guard::RunGuard;
use crate::notifier::{Notification, NotificationSink, Recipient};
use crate::store::ChallengeStateStore;
use librebot_feeds::ChallengeSource;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of [`DailyChallengeWatcher::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DailyOutcome {
    Skipped,
    /// The challenge was already announced
    Unchanged,
    Notified { slug: String },
    Failed,
}

/// Announces each new daily challenge once.
pub struct DailyChallengeWatcher {
    source: Arc<dyn ChallengeSource>,
    state: Arc<dyn ChallengeStateStore>,
    sink: Arc<dyn NotificationSink>,
    target_chat: i64,
    guard: RunGuard,
}

impl DailyChallengeWatcher {
    pub fn new(
        source: Arc<dyn ChallengeSource>,
        state: Arc<dyn ChallengeStateStore>,
        sink: Arc<dyn NotificationSink>,
        target_chat: i64,
    ) -> Self {
        Self {
            source,
            state,
            sink,
            target_chat,
            guard: RunGuard::new(),
        }
    }

    pub async fn run(&self) -> DailyOutcome {
        let Some(ticket) = self.guard.try_start() else {
            warn!("Daily challenge check still running, skipping this tick");
            return DailyOutcome::Skipped;
        };
        let generation = ticket.generation();
        debug!(generation, "Checking for new daily challenge");

        let challenge = match self.source.fetch_daily().await {
            Ok(challenge) => challenge,
            Err(e) => {
                warn!(generation, error = %e, "No daily challenge data received");
                return DailyOutcome::Failed;
            }
        };

        let slug = challenge.slug().to_string();
        match self.state.last_notified_slug().await {
            Ok(Some(last)) if last == slug => return DailyOutcome::Unchanged,
            Ok(_) => {}
            Err(e) => {
                error!(generation, error = %e, "Failed to read daily challenge state");
                return DailyOutcome::Failed;
            }
        }

        info!(generation, title = %challenge.question.title, "New daily challenge found");

        if let Err(e) = self.sink.ready(self.target_chat).await {
            error!(generation, chat_id = self.target_chat, error = %e, "Daily challenge chat unavailable");
            return DailyOutcome::Failed;
        }

        // Mentions are best-effort; the announcement goes out either way.
        let subscribers: Vec<Recipient> = match self.state.subscribers().await {
            Ok(subscribers) => subscribers.iter().map(Recipient::from).collect(),
            Err(e) => {
                warn!(generation, error = %e, "Failed to load daily challenge subscribers");
                Vec::new()
            }
        };

        let notification = Notification::daily_challenge(&subscribers, challenge);
        if let Err(e) = self.sink.send(self.target_chat, &notification).await {
            error!(generation, error = %e, "Error sending daily challenge notification");
            return DailyOutcome::Failed;
        }

        if let Err(e) = self.state.set_last_notified_slug(&slug).await {
            error!(generation, slug = %slug, error = %e, "Failed to persist notified slug");
        }
        info!(generation, slug = %slug, mentioned = subscribers.len(), "Daily challenge announced");
        DailyOutcome::Notified { slug }
    }
}
