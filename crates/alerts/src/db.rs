//! SQLite persistence for filters, daily challenge state, subscribers and
//! command cooldowns.

use librebot_core::{AuctionFilter, Currency, FilterCriteria};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Failed to encode filter criteria: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A user opted in to daily challenge mentions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub user_id: i64,
    pub display_name: String,
}

/// Database connection.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

type FilterRow = (i64, i64, String, String, i64);

fn filter_from_row((id, owner_id, currency, criteria, created_at): FilterRow) -> Option<AuctionFilter> {
    let Some(currency) = Currency::from_str(&currency) else {
        warn!(filter_id = id, currency = %currency, "Skipping filter with unknown currency");
        return None;
    };
    let criteria: FilterCriteria = match serde_json::from_str(&criteria) {
        Ok(criteria) => criteria,
        Err(e) => {
            warn!(filter_id = id, error = %e, "Skipping filter with unreadable criteria");
            return None;
        }
    };
    Some(AuctionFilter {
        id,
        owner_id,
        currency,
        criteria,
        created_at,
    })
}

impl Database {
    /// Connect to the SQLite database at the given URL and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let in_memory = database_url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
        }

        // Every in-memory connection is its own database; keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auction_filters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                currency TEXT NOT NULL DEFAULT 'EUR',
                criteria TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_auction_filters_owner ON auction_filters(owner_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_auction_filters_created ON auction_filters(created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_challenge_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                last_notified_slug TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_subscribers (
                user_id INTEGER PRIMARY KEY,
                display_name TEXT NOT NULL,
                subscribed_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS command_cooldowns (
                user_id INTEGER NOT NULL,
                command TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, command)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ---- auction filters ----

    /// Store a new filter and return its ID.
    pub async fn insert_filter(
        &self,
        owner_id: i64,
        currency: Currency,
        criteria: &FilterCriteria,
        created_at: i64,
    ) -> Result<i64, DbError> {
        let criteria_json = serde_json::to_string(criteria)?;
        let result = sqlx::query(
            "INSERT INTO auction_filters (owner_id, currency, criteria, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(owner_id)
        .bind(currency.as_str())
        .bind(&criteria_json)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn count_filters_for_owner(&self, owner_id: i64) -> Result<i64, DbError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM auction_filters WHERE owner_id = ?")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// All stored filters in insertion order. Unreadable rows are logged and skipped.
    pub async fn list_filters(&self) -> Result<Vec<AuctionFilter>, DbError> {
        let rows = sqlx::query_as::<_, FilterRow>(
            "SELECT id, owner_id, currency, criteria, created_at FROM auction_filters ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(filter_from_row).collect())
    }

    #[cfg(test)]
    pub async fn list_filters_for_owner(&self, owner_id: i64) -> Result<Vec<AuctionFilter>, DbError> {
        let rows = sqlx::query_as::<_, FilterRow>(
            "SELECT id, owner_id, currency, criteria, created_at FROM auction_filters WHERE owner_id = ? ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(filter_from_row).collect())
    }

    /// Delete filters by ID. Missing IDs are ignored.
    pub async fn delete_filters(&self, ids: &[i64]) -> Result<u64, DbError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM auction_filters WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Delete filters created strictly before `cutoff` (epoch seconds).
    pub async fn delete_filters_older_than(&self, cutoff: i64) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM auction_filters WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_filters_for_owner(&self, owner_id: i64) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM auction_filters WHERE owner_id = ?")
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ---- daily challenge ----

    pub async fn last_notified_slug(&self) -> Result<Option<String>, DbError> {
        let slug = sqlx::query_scalar::<_, String>(
            "SELECT last_notified_slug FROM daily_challenge_state WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(slug)
    }

    pub async fn set_last_notified_slug(&self, slug: &str) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO daily_challenge_state (id, last_notified_slug) VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET last_notified_slug = excluded.last_notified_slug,
                                          updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(slug)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Subscribe a user. Returns false if they were already subscribed.
    pub async fn add_subscriber(&self, user_id: i64, display_name: &str) -> Result<bool, DbError> {
        let result = sqlx::query(
            "INSERT INTO daily_subscribers (user_id, display_name) VALUES (?, ?) ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(display_name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Unsubscribe a user. Returns false if they were not subscribed.
    pub async fn remove_subscriber(&self, user_id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM daily_subscribers WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_subscribers(&self) -> Result<Vec<Subscriber>, DbError> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT user_id, display_name FROM daily_subscribers ORDER BY subscribed_at, user_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, display_name)| Subscriber {
                user_id,
                display_name,
            })
            .collect())
    }

    // ---- command cooldowns ----

    /// Start a cooldown for `(user_id, command)` unless one is still running.
    ///
    /// Returns `None` when the cooldown was acquired, or the remaining seconds
    /// of the running one.
    pub async fn try_acquire_cooldown(
        &self,
        user_id: i64,
        command: &str,
        now: i64,
        ttl_secs: i64,
    ) -> Result<Option<i64>, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO command_cooldowns (user_id, command, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(user_id, command) DO UPDATE SET expires_at = excluded.expires_at
            WHERE command_cooldowns.expires_at <= ?
            "#,
        )
        .bind(user_id)
        .bind(command)
        .bind(now + ttl_secs)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(None);
        }

        let expires_at = sqlx::query_scalar::<_, i64>(
            "SELECT expires_at FROM command_cooldowns WHERE user_id = ? AND command = ?",
        )
        .bind(user_id)
        .bind(command)
        .fetch_optional(&self.pool)
        .await?;

        Ok(expires_at.map(|expires_at| (expires_at - now).max(1)))
    }

    /// Drop cooldown rows that have expired.
    pub async fn purge_expired_cooldowns(&self, now: i64) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM command_cooldowns WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
