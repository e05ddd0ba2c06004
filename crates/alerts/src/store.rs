//! Storage ports used by the watchers.

use crate::db::{Database, DbError, Subscriber};
use async_trait::async_trait;
use librebot_core::AuctionFilter;

/// Read/delete access to stored auction filters.
#[async_trait]
pub trait FilterStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<AuctionFilter>, DbError>;

    /// Delete by ID; unknown IDs are not an error.
    async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64, DbError>;

    /// Delete every filter created before `cutoff` (epoch seconds).
    async fn delete_older_than(&self, cutoff: i64) -> Result<u64, DbError>;
}

/// Persistent state of the daily challenge poller.
#[async_trait]
pub trait ChallengeStateStore: Send + Sync {
    async fn last_notified_slug(&self) -> Result<Option<String>, DbError>;
    async fn set_last_notified_slug(&self, slug: &str) -> Result<(), DbError>;
    async fn subscribers(&self) -> Result<Vec<Subscriber>, DbError>;
}

#[async_trait]
impl FilterStore for Database {
    async fn list_all(&self) -> Result<Vec<AuctionFilter>, DbError> {
        self.list_filters().await
    }

    async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64, DbError> {
        self.delete_filters(ids).await
    }

    async fn delete_older_than(&self, cutoff: i64) -> Result<u64, DbError> {
        self.delete_filters_older_than(cutoff).await
    }
}

#[async_trait]
impl ChallengeStateStore for Database {
    async fn last_notified_slug(&self) -> Result<Option<String>, DbError> {
        Database::last_notified_slug(self).await
    }

    async fn set_last_notified_slug(&self, slug: &str) -> Result<(), DbError> {
        Database::set_last_notified_slug(self, slug).await
    }

    async fn subscribers(&self) -> Result<Vec<Subscriber>, DbError> {
        self.list_subscribers().await
    }
}
