//! Periodic task loops.

use async_trait::async_trait;
use librebot_alerts::{AuctionWatcher, DailyChallengeWatcher, DailyOutcome, RunOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// A job run on a fixed period.
#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Run once. Implementations log their own failures.
    async fn run_once(&self);
}

#[async_trait]
impl PeriodicTask for AuctionWatcher {
    fn name(&self) -> &'static str {
        "hetzner-auction"
    }

    async fn run_once(&self) {
        match self.run().await {
            RunOutcome::Completed(report) => debug!(?report, "Auction run finished"),
            outcome => debug!(?outcome, "Auction run ended early"),
        }
    }
}

#[async_trait]
impl PeriodicTask for DailyChallengeWatcher {
    fn name(&self) -> &'static str {
        "leetcode-daily"
    }

    async fn run_once(&self) {
        let outcome = self.run().await;
        if outcome != DailyOutcome::Unchanged {
            debug!(?outcome, "Daily challenge run finished");
        }
    }
}

/// Run `task` immediately and then every `period` until `shutdown` turns true.
///
/// Each tick spawns its run, so a slow run never delays the schedule; the
/// task's own run guard decides whether an overlapping tick does any work.
pub async fn run_periodic<T: PeriodicTask>(
    task: Arc<T>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(task = task.name(), period_secs = period.as_secs(), "Scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let task = Arc::clone(&task);
                tokio::spawn(async move { task.run_once().await });
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(task = task.name(), "Scheduler stopped");
}
