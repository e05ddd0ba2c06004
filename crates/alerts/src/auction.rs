//! Auction watcher: matches stored filters against the live auction feeds,
//! notifies owners and sweeps notified and expired filters.

use crate::guard::RunGuard;
use crate::notifier::{AuctionAlert, Notification, NotificationSink, UserRegistry};
use crate::store::FilterStore;
use librebot_core::{
    find_first_match, inclusive_price, retention_cutoff, AuctionFilter, Clock, Currency, Snapshot,
};
use librebot_feeds::{fetch_all_currencies, SnapshotSource, DEFAULT_FETCH_DELAY};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Configuration for the auction watcher.
#[derive(Debug, Clone)]
pub struct AuctionWatcherConfig {
    /// Chat that receives every auction notification
    pub target_chat: i64,
    /// Pause between the two currency feed requests
    pub fetch_delay: Duration,
}

impl AuctionWatcherConfig {
    pub fn new(target_chat: i64) -> Self {
        Self {
            target_chat,
            fetch_delay: DEFAULT_FETCH_DELAY,
        }
    }
}

/// Why a run stopped before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    SinkUnavailable,
    StoreUnavailable,
    FetchFailed,
}

/// Counters for one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub generation: u64,
    pub filters_checked: usize,
    /// Filters skipped because their currency had no usable snapshot
    pub filters_without_snapshot: usize,
    pub matched: usize,
    pub notified: usize,
    pub deleted_notified: u64,
    pub deleted_expired: u64,
}

/// Result of [`AuctionWatcher::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run was still in progress
    Skipped,
    /// No filters stored; nothing was fetched
    NoFilters,
    Aborted(AbortReason),
    Completed(RunReport),
}

/// Periodic matcher and notifier for auction filters.
pub struct AuctionWatcher {
    store: Arc<dyn FilterStore>,
    source: Arc<dyn SnapshotSource>,
    registry: Arc<dyn UserRegistry>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    config: AuctionWatcherConfig,
    guard: RunGuard,
}

impl AuctionWatcher {
    pub fn new(
        store: Arc<dyn FilterStore>,
        source: Arc<dyn SnapshotSource>,
        registry: Arc<dyn UserRegistry>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        config: AuctionWatcherConfig,
    ) -> Self {
        Self {
            store,
            source,
            registry,
            sink,
            clock,
            config,
            guard: RunGuard::new(),
        }
    }

    /// Run one check. Never fails; every error is logged and folded into the outcome.
    pub async fn run(&self) -> RunOutcome {
        let Some(ticket) = self.guard.try_start() else {
            warn!(
                last_generation = self.guard.last_generation(),
                "Auction check still running, skipping this tick"
            );
            return RunOutcome::Skipped;
        };
        let generation = ticket.generation();
        info!(generation, "Checking Hetzner auction");

        if let Err(e) = self.sink.ready(self.config.target_chat).await {
            error!(generation, chat_id = self.config.target_chat, error = %e, "Notification chat unavailable");
            return RunOutcome::Aborted(AbortReason::SinkUnavailable);
        }

        let filters = match self.store.list_all().await {
            Ok(filters) => filters,
            Err(e) => {
                error!(generation, error = %e, "Failed to load filters");
                return RunOutcome::Aborted(AbortReason::StoreUnavailable);
            }
        };
        if filters.is_empty() {
            debug!(generation, "No filters stored");
            return RunOutcome::NoFilters;
        }

        let snapshots = match self.fetch_snapshots().await {
            Some(snapshots) => snapshots,
            None => return RunOutcome::Aborted(AbortReason::FetchFailed),
        };

        let mut report = RunReport {
            generation,
            filters_checked: filters.len(),
            ..Default::default()
        };
        let mut notified_ids = Vec::new();

        for filter in &filters {
            let Some(snapshot) = snapshots.get(&filter.currency) else {
                report.filters_without_snapshot += 1;
                continue;
            };
            let Some(alert) = match_filter(filter, snapshot) else {
                continue;
            };
            report.matched += 1;

            if self.notify(filter, alert).await {
                report.notified += 1;
                notified_ids.push(filter.id);
            }
        }

        self.sweep(&notified_ids, &mut report).await;

        info!(
            generation,
            checked = report.filters_checked,
            matched = report.matched,
            notified = report.notified,
            deleted_notified = report.deleted_notified,
            deleted_expired = report.deleted_expired,
            "Auction check complete"
        );
        RunOutcome::Completed(report)
    }

    /// Fetch and normalize both feeds. `None` aborts the run; a structurally
    /// invalid feed only leaves its currency without a snapshot.
    async fn fetch_snapshots(&self) -> Option<HashMap<Currency, Snapshot>> {
        let documents =
            match fetch_all_currencies(self.source.as_ref(), self.config.fetch_delay).await {
                Ok(documents) => documents,
                Err(e) => {
                    error!(
                        error = %e,
                        transient = e.is_transient(),
                        retry_in = ?e.suggested_retry_delay(),
                        "Error fetching auction data"
                    );
                    return None;
                }
            };

        let mut snapshots = HashMap::new();
        for (currency, document) in documents {
            match Snapshot::from_json(currency, &document) {
                Ok(snapshot) => {
                    if snapshot.skipped > 0 {
                        debug!(currency = %currency, skipped = snapshot.skipped, "Dropped unreadable listings");
                    }
                    snapshots.insert(currency, snapshot);
                }
                Err(e) => warn!(currency = %currency, error = %e, "Ignoring invalid auction feed"),
            }
        }
        Some(snapshots)
    }

    /// Resolve the owner and send the alert. Returns true only on delivery.
    async fn notify(&self, filter: &AuctionFilter, alert: AuctionAlert) -> bool {
        let Some(recipient) = self.registry.resolve(filter.owner_id).await else {
            warn!(filter_id = filter.id, owner_id = filter.owner_id, "Filter owner not resolvable");
            return false;
        };

        let listing_id = alert.listing.id;
        let notification = Notification::auction_match(&recipient, alert);
        match self.sink.send(self.config.target_chat, &notification).await {
            Ok(()) => {
                info!(filter_id = filter.id, owner_id = filter.owner_id, listing_id, "Auction alert sent");
                true
            }
            Err(e) => {
                error!(filter_id = filter.id, owner_id = filter.owner_id, error = %e, "Error notifying user");
                false
            }
        }
    }

    /// Delete notified filters, then expired ones. Each pass is independent.
    async fn sweep(&self, notified_ids: &[i64], report: &mut RunReport) {
        if !notified_ids.is_empty() {
            match self.store.delete_by_ids(notified_ids).await {
                Ok(deleted) => {
                    report.deleted_notified = deleted;
                    info!(deleted, "Deleted notified filters");
                }
                Err(e) => error!(error = %e, "Error deleting notified filters"),
            }
        }

        let cutoff = retention_cutoff(self.clock.now_secs());
        match self.store.delete_older_than(cutoff).await {
            Ok(deleted) => {
                report.deleted_expired = deleted;
                if deleted > 0 {
                    info!(deleted, "Deleted expired filters");
                }
            }
            Err(e) => error!(error = %e, "Error deleting expired filters"),
        }
    }
}

/// Match one filter against its currency's snapshot.
pub fn match_filter(filter: &AuctionFilter, snapshot: &Snapshot) -> Option<AuctionAlert> {
    let listing = find_first_match(&filter.criteria, &snapshot.listings)?;
    let vat_percentage = filter.criteria.vat_percentage;
    Some(AuctionAlert {
        filter_id: filter.id,
        listing: listing.clone(),
        currency: filter.currency,
        vat_percentage,
        price_inclusive: inclusive_price(listing.price_exclusive, vat_percentage),
        criteria: filter.criteria.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbError;
    use crate::notifier::{NotificationPayload, Recipient, SinkError};
    use async_trait::async_trait;
    use librebot_core::{FilterCriteria, ManualClock};
    use librebot_feeds::FeedError;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    const DAY: i64 = 24 * 60 * 60;
    const NOW: i64 = 1_700_000_000;
    const CHAT: i64 = -100;

    #[derive(Default)]
    struct MemoryStore {
        filters: Mutex<Vec<AuctionFilter>>,
        fail_deletes: AtomicBool,
        fail_list: AtomicBool,
    }

    impl MemoryStore {
        fn with(filters: Vec<AuctionFilter>) -> Self {
            Self {
                filters: Mutex::new(filters),
                ..Default::default()
            }
        }

        fn ids(&self) -> Vec<i64> {
            self.filters.lock().unwrap().iter().map(|f| f.id).collect()
        }
    }

    #[async_trait]
    impl FilterStore for MemoryStore {
        async fn list_all(&self) -> Result<Vec<AuctionFilter>, DbError> {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(DbError::Sqlx(sqlx::Error::PoolClosed));
            }
            Ok(self.filters.lock().unwrap().clone())
        }

        async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64, DbError> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(DbError::Sqlx(sqlx::Error::PoolClosed));
            }
            let mut filters = self.filters.lock().unwrap();
            let before = filters.len();
            filters.retain(|f| !ids.contains(&f.id));
            Ok((before - filters.len()) as u64)
        }

        async fn delete_older_than(&self, cutoff: i64) -> Result<u64, DbError> {
            let mut filters = self.filters.lock().unwrap();
            let before = filters.len();
            filters.retain(|f| f.created_at >= cutoff);
            Ok((before - filters.len()) as u64)
        }
    }

    struct StaticSource {
        usd: Value,
        eur: Value,
        fail: bool,
        calls: Mutex<usize>,
    }

    impl StaticSource {
        fn new(usd: Value, eur: Value) -> Self {
            Self {
                usd,
                eur,
                fail: false,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl SnapshotSource for StaticSource {
        async fn fetch(&self, currency: Currency) -> Result<Value, FeedError> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(FeedError::Timeout("feed".to_string()));
            }
            Ok(match currency {
                Currency::USD => self.usd.clone(),
                Currency::EUR => self.eur.clone(),
            })
        }
    }

    struct KnownUsers;

    #[async_trait]
    impl UserRegistry for KnownUsers {
        async fn resolve(&self, owner_id: i64) -> Option<Recipient> {
            // Negative IDs play the role of users who left the chat
            (owner_id > 0).then(|| Recipient::new(owner_id, format!("user{}", owner_id)))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<Notification>>,
        fail_sends: AtomicBool,
        unavailable: AtomicBool,
    }

    impl RecordingSink {
        fn sent_filter_ids(&self) -> Vec<i64> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|n| match &n.payload {
                    NotificationPayload::AuctionMatch(alert) => Some(alert.filter_id),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn ready(&self, target: i64) -> Result<(), SinkError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(SinkError::Unavailable(target));
            }
            Ok(())
        }

        async fn send(&self, _target: i64, notification: &Notification) -> Result<(), SinkError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(SinkError::Delivery("boom".to_string()));
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn server(id: u64, price: f64, ram: u64) -> Value {
        json!({
            "id": id,
            "name": format!("SB{}", id),
            "price": price,
            "cpu": "Intel Core i7-6700",
            "ram_size": ram,
            "is_ecc": false,
            "hdd_size": 1024,
            "hdd_count": 2,
            "serverDiskData": {"nvme": [], "sata": [512, 512], "hdd": []},
            "datacenter": "FSN1-DC14"
        })
    }

    fn filter(id: i64, owner_id: i64, currency: Currency, criteria: FilterCriteria) -> AuctionFilter {
        AuctionFilter {
            id,
            owner_id,
            currency,
            criteria,
            created_at: NOW - DAY,
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        source: Arc<StaticSource>,
        sink: Arc<RecordingSink>,
        watcher: AuctionWatcher,
    }

    fn harness(filters: Vec<AuctionFilter>, source: StaticSource) -> Harness {
        let store = Arc::new(MemoryStore::with(filters));
        let source = Arc::new(source);
        let sink = Arc::new(RecordingSink::default());
        let config = AuctionWatcherConfig {
            target_chat: CHAT,
            fetch_delay: Duration::ZERO,
        };
        let watcher = AuctionWatcher::new(
            store.clone(),
            source.clone(),
            Arc::new(KnownUsers),
            sink.clone(),
            Arc::new(ManualClock::new(NOW)),
            config,
        );
        Harness {
            store,
            source,
            sink,
            watcher,
        }
    }

    fn completed(outcome: RunOutcome) -> RunReport {
        match outcome {
            RunOutcome::Completed(report) => report,
            other => panic!("expected completed run, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_match_scenario() {
        let criteria = FilterCriteria {
            max_price: Some(50),
            vat_percentage: 19,
            min_ram_gb: Some(32),
            ..Default::default()
        };
        let eur = json!({"server": [server(1, 45.0, 16), server(2, 40.0, 32), server(3, 10.0, 64)]});
        let h = harness(
            vec![filter(10, 7, Currency::EUR, criteria)],
            StaticSource::new(json!({"server": []}), eur),
        );

        let report = completed(h.watcher.run().await);
        assert_eq!(report.matched, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(report.deleted_notified, 1);

        let sent = h.sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        match &sent[0].payload {
            NotificationPayload::AuctionMatch(alert) => {
                assert_eq!(alert.listing.id, 2);
                assert!((alert.price_inclusive - 47.6).abs() < 1e-9);
            }
            other => panic!("unexpected payload {:?}", other),
        }
        assert!(sent[0].to_html().contains("47.60 EUR (incl. 19% VAT)"));
        assert!(h.store.ids().is_empty());
    }

    #[tokio::test]
    async fn test_filters_use_their_own_currency() {
        let usd = json!({"server": [server(1, 30.0, 64)]});
        let eur = json!({"server": []});
        let h = harness(
            vec![
                filter(1, 7, Currency::USD, FilterCriteria::default()),
                filter(2, 8, Currency::EUR, FilterCriteria::default()),
            ],
            StaticSource::new(usd, eur),
        );

        let report = completed(h.watcher.run().await);
        assert_eq!(report.matched, 1);
        assert_eq!(h.sink.sent_filter_ids(), vec![1]);
        assert_eq!(h.store.ids(), vec![2]);
    }

    #[tokio::test]
    async fn test_no_filters_skips_fetch() {
        let h = harness(vec![], StaticSource::new(json!({}), json!({})));
        assert_eq!(h.watcher.run().await, RunOutcome::NoFilters);
        assert_eq!(*h.source.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_run() {
        let mut source = StaticSource::new(json!({}), json!({}));
        source.fail = true;
        let h = harness(vec![filter(1, 7, Currency::EUR, FilterCriteria::default())], source);

        assert_eq!(
            h.watcher.run().await,
            RunOutcome::Aborted(AbortReason::FetchFailed)
        );
        assert!(h.sink.sent.lock().unwrap().is_empty());
        assert_eq!(h.store.ids(), vec![1]);
    }

    #[tokio::test]
    async fn test_sink_unavailable_aborts_run() {
        let h = harness(
            vec![filter(1, 7, Currency::EUR, FilterCriteria::default())],
            StaticSource::new(json!({"server": []}), json!({"server": [server(1, 1.0, 1)]})),
        );
        h.sink.unavailable.store(true, Ordering::SeqCst);

        assert_eq!(
            h.watcher.run().await,
            RunOutcome::Aborted(AbortReason::SinkUnavailable)
        );
        assert_eq!(*h.source.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_unavailable_aborts_run() {
        let h = harness(
            vec![filter(1, 7, Currency::EUR, FilterCriteria::default())],
            StaticSource::new(json!({"server": []}), json!({"server": [server(1, 1.0, 1)]})),
        );
        h.store.fail_list.store(true, Ordering::SeqCst);

        assert_eq!(
            h.watcher.run().await,
            RunOutcome::Aborted(AbortReason::StoreUnavailable)
        );
        assert_eq!(*h.source.calls.lock().unwrap(), 0);
        assert!(h.sink.sent.lock().unwrap().is_empty());
        assert_eq!(h.store.ids(), vec![1]);
    }

    #[tokio::test]
    async fn test_invalid_snapshot_skips_only_its_filters() {
        let usd = json!({"server": [server(1, 30.0, 64)]});
        let eur = json!({"error": "maintenance"});
        let h = harness(
            vec![
                filter(1, 7, Currency::EUR, FilterCriteria::default()),
                filter(2, 8, Currency::USD, FilterCriteria::default()),
            ],
            StaticSource::new(usd, eur),
        );

        let report = completed(h.watcher.run().await);
        assert_eq!(report.filters_without_snapshot, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(h.store.ids(), vec![1]);
    }

    #[tokio::test]
    async fn test_failed_notification_is_retried_next_run() {
        let eur = json!({"server": [server(1, 30.0, 64)]});
        let h = harness(
            vec![filter(1, 7, Currency::EUR, FilterCriteria::default())],
            StaticSource::new(json!({"server": []}), eur),
        );

        h.sink.fail_sends.store(true, Ordering::SeqCst);
        let report = completed(h.watcher.run().await);
        assert_eq!(report.matched, 1);
        assert_eq!(report.notified, 0);
        assert_eq!(h.store.ids(), vec![1]);

        h.sink.fail_sends.store(false, Ordering::SeqCst);
        let report = completed(h.watcher.run().await);
        assert_eq!(report.notified, 1);
        assert_eq!(report.deleted_notified, 1);
        assert!(h.store.ids().is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_owner_keeps_filter() {
        let eur = json!({"server": [server(1, 30.0, 64)]});
        let h = harness(
            vec![
                filter(1, -5, Currency::EUR, FilterCriteria::default()),
                filter(2, 7, Currency::EUR, FilterCriteria::default()),
            ],
            StaticSource::new(json!({"server": []}), eur),
        );

        let report = completed(h.watcher.run().await);
        assert_eq!(report.matched, 2);
        assert_eq!(report.notified, 1);
        assert_eq!(h.store.ids(), vec![1]);
    }

    #[tokio::test]
    async fn test_one_notification_per_filter() {
        let eur = json!({"server": [server(1, 30.0, 64), server(2, 20.0, 64), server(3, 10.0, 64)]});
        let h = harness(
            vec![filter(1, 7, Currency::EUR, FilterCriteria::default())],
            StaticSource::new(json!({"server": []}), eur),
        );

        let report = completed(h.watcher.run().await);
        assert_eq!(report.notified, 1);
        assert_eq!(report.deleted_notified, 1);
        assert_eq!(h.sink.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_filters_swept_without_match() {
        let impossible = FilterCriteria {
            min_ram_gb: Some(1024),
            ..Default::default()
        };
        let mut old = filter(1, 7, Currency::EUR, impossible.clone());
        old.created_at = NOW - 91 * DAY;
        let fresh = filter(2, 7, Currency::EUR, impossible);

        let eur = json!({"server": [server(1, 30.0, 64)]});
        let h = harness(vec![old, fresh], StaticSource::new(json!({"server": []}), eur));

        let report = completed(h.watcher.run().await);
        assert_eq!(report.matched, 0);
        assert_eq!(report.deleted_expired, 1);
        assert_eq!(h.store.ids(), vec![2]);

        let report = completed(h.watcher.run().await);
        assert_eq!(report.deleted_expired, 0);
        assert_eq!(h.store.ids(), vec![2]);
    }

    #[tokio::test]
    async fn test_sweep_passes_are_independent() {
        let mut old = filter(1, 7, Currency::USD, FilterCriteria::default());
        old.created_at = NOW - 100 * DAY;
        let eur = json!({"server": [server(1, 30.0, 64)]});
        let h = harness(
            vec![old, filter(2, 7, Currency::EUR, FilterCriteria::default())],
            StaticSource::new(json!({"server": []}), eur),
        );
        h.store.fail_deletes.store(true, Ordering::SeqCst);

        let report = completed(h.watcher.run().await);
        assert_eq!(report.notified, 1);
        assert_eq!(report.deleted_notified, 0);
        assert_eq!(report.deleted_expired, 1);
        assert_eq!(h.store.ids(), vec![2]);
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let h = harness(vec![], StaticSource::new(json!({}), json!({})));
        let _ticket = h.watcher.guard.try_start().unwrap();
        assert_eq!(h.watcher.run().await, RunOutcome::Skipped);
    }
}
