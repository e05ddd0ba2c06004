//! Daily coding challenge GraphQL client.

use crate::error::FeedError;
use crate::rest::{build_client, post_json, REQUEST_TIMEOUT};
use async_trait::async_trait;
use librebot_core::DailyChallenge;
use serde_json::{json, Value};
use tracing::warn;

const DAILY_CHALLENGE_QUERY: &str = r#"
query questionOfToday {
  activeDailyCodingChallengeQuestion {
    date
    userStatus
    link
    question {
      acRate
      difficulty
      frontendQuestionId: questionFrontendId
      paidOnly: isPaidOnly
      title
      titleSlug
      topicTags {
        name
        id
        slug
      }
    }
  }
}"#;

/// Source of the current daily challenge.
#[async_trait]
pub trait ChallengeSource: Send + Sync {
    async fn fetch_daily(&self) -> Result<DailyChallenge, FeedError>;
}

/// LeetCode GraphQL client.
pub struct LeetCodeClient {
    client: reqwest::Client,
    endpoint: String,
}

impl LeetCodeClient {
    const ENDPOINT: &'static str = "https://leetcode.com/graphql";

    pub fn new() -> Result<Self, FeedError> {
        Self::with_endpoint(Self::ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, FeedError> {
        Ok(Self {
            client: build_client(REQUEST_TIMEOUT)?,
            endpoint: endpoint.into(),
        })
    }
}

/// Extract the challenge from a GraphQL response body.
pub fn parse_daily_challenge(body: &Value) -> Result<DailyChallenge, FeedError> {
    let payload = &body["data"]["activeDailyCodingChallengeQuestion"];
    if payload.is_null() {
        warn!(response = %body, "Unexpected daily challenge response structure");
        return Err(FeedError::ParseError(
            "missing activeDailyCodingChallengeQuestion".to_string(),
        ));
    }

    let challenge: DailyChallenge = serde_json::from_value(payload.clone())?;
    if challenge.question.title_slug.is_empty() {
        return Err(FeedError::ParseError("empty titleSlug".to_string()));
    }
    Ok(challenge)
}

#[async_trait]
impl ChallengeSource for LeetCodeClient {
    async fn fetch_daily(&self) -> Result<DailyChallenge, FeedError> {
        let request = json!({
            "query": DAILY_CHALLENGE_QUERY,
            "variables": {},
        });
        let body = post_json(&self.client, &self.endpoint, &request).await?;
        parse_daily_challenge(&body)
    }
}
