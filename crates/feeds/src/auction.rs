//! Server auction feed.
//!
//! The auction publishes one JSON document per currency. Both are fetched
//! sequentially with a pause in between to stay within the provider's
//! informal rate tolerance.

use crate::error::FeedError;
use crate::rest::{build_client, get_json, REQUEST_TIMEOUT};
use async_trait::async_trait;
use librebot_core::Currency;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Pause between the two currency fetches.
pub const DEFAULT_FETCH_DELAY: Duration = Duration::from_secs(5);

/// Source of raw auction feed documents.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the raw feed document for one currency.
    async fn fetch(&self, currency: Currency) -> Result<Value, FeedError>;
}

/// HTTP client for the Hetzner server auction live data.
pub struct HetznerFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HetznerFetcher {
    const BASE_URL: &'static str = "https://www.hetzner.com/_resources/app/data/app";

    /// Create a fetcher against the public feed.
    pub fn new() -> Result<Self, FeedError> {
        Self::with_base_url(Self::BASE_URL)
    }

    /// Create a fetcher against another host (mirrors, tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, FeedError> {
        Ok(Self {
            client: build_client(REQUEST_TIMEOUT)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Feed URL for a currency.
    pub fn url_for(&self, currency: Currency) -> String {
        format!("{}/live_data_sb_{}.json", self.base_url, currency.as_str())
    }
}

#[async_trait]
impl SnapshotSource for HetznerFetcher {
    async fn fetch(&self, currency: Currency) -> Result<Value, FeedError> {
        let url = self.url_for(currency);
        let document = get_json(&self.client, &url).await?;
        debug!(
            currency = %currency,
            servers = document["server"].as_array().map(Vec::len).unwrap_or(0),
            "Fetched auction feed"
        );
        Ok(document)
    }
}

/// Fetch every currency feed in order, sleeping `delay` between requests.
///
/// Fails as a whole if any single fetch fails; matching never runs against
/// half the data.
pub async fn fetch_all_currencies(
    source: &dyn SnapshotSource,
    delay: Duration,
) -> Result<Vec<(Currency, Value)>, FeedError> {
    let mut documents = Vec::with_capacity(Currency::ALL.len());

    for (idx, currency) in Currency::ALL.into_iter().enumerate() {
        if idx > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let document = source.fetch(currency).await?;
        documents.push((currency, document));
    }

    info!(feeds = documents.len(), "Fetched auction feeds");
    Ok(documents)
}
