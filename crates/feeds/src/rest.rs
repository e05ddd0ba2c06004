//! Shared HTTP plumbing for the REST sources.

use crate::error::FeedError;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Browser-like User-Agent; the auction feed rejects default client agents.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15";

/// Default per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client shared by all sources.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, FeedError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FeedError::ConnectionFailed(format!("Failed to build client: {}", e)))
}

/// GET a URL and decode the body as JSON.
pub async fn get_json(client: &reqwest::Client, url: &str) -> Result<Value, FeedError> {
    debug!(url = url, "GET");
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(FeedError::from_status(response.status(), url));
    }

    Ok(response.json::<Value>().await?)
}

/// POST a JSON body and decode the response as JSON.
pub async fn post_json<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
) -> Result<Value, FeedError> {
    debug!(url = url, "POST");
    let response = client.post(url).json(body).send().await?;

    if !response.status().is_success() {
        return Err(FeedError::from_status(response.status(), url));
    }

    Ok(response.json::<Value>().await?)
}
