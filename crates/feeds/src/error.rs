//! Error types for feed operations.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching external data.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Request failed: {0}")]
    ConnectionFailed(String),

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::ParseError(err.to_string())
        } else {
            FeedError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl FeedError {
    /// Build an error from a non-success HTTP status.
    pub fn from_status(status: reqwest::StatusCode, url: &str) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            FeedError::RateLimitExceeded
        } else {
            FeedError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }
        }
    }

    /// Returns true if this error is transient and likely to succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::ConnectionFailed(_)
            | FeedError::Timeout(_)
            | FeedError::RateLimitExceeded => true,
            FeedError::HttpStatus { status, .. } => *status >= 500,
            FeedError::ParseError(_) => false,
        }
    }

    /// Returns a suggested delay before the next attempt, if applicable.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            FeedError::RateLimitExceeded => Some(Duration::from_secs(60)),
            FeedError::ConnectionFailed(_) => Some(Duration::from_secs(5)),
            FeedError::Timeout(_) => Some(Duration::from_secs(2)),
            FeedError::HttpStatus { status, .. } if *status >= 500 => Some(Duration::from_secs(30)),
            FeedError::HttpStatus { .. } | FeedError::ParseError(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FeedError::ConnectionFailed("reset".into()).is_transient());
        assert!(FeedError::RateLimitExceeded.is_transient());
        assert!(FeedError::HttpStatus { status: 503, url: "u".into() }.is_transient());
        assert!(!FeedError::HttpStatus { status: 404, url: "u".into() }.is_transient());
        assert!(!FeedError::ParseError("bad".into()).is_transient());
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            FeedError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "u"),
            FeedError::RateLimitExceeded
        ));
        assert!(matches!(
            FeedError::from_status(reqwest::StatusCode::BAD_GATEWAY, "u"),
            FeedError::HttpStatus { status: 502, .. }
        ));
    }

    #[test]
    fn test_retry_delay() {
        assert_eq!(
            FeedError::RateLimitExceeded.suggested_retry_delay(),
            Some(Duration::from_secs(60))
        );
        assert_eq!(FeedError::ParseError("x".into()).suggested_retry_delay(), None);
    }
}
