//! Filter retention policy.

use std::time::Duration;

/// Filters older than this are purged whether or not they ever matched.
pub const RETENTION_WINDOW: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// Creation timestamps strictly below this cutoff are expired.
pub fn retention_cutoff(now_secs: i64) -> i64 {
    now_secs - RETENTION_WINDOW.as_secs() as i64
}

/// Check whether a filter created at `created_at` has outlived the window.
pub fn is_expired(created_at: i64, now_secs: i64) -> bool {
    created_at < retention_cutoff(now_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 24 * 60 * 60;

    #[test]
    fn test_retention_cutoff() {
        assert_eq!(retention_cutoff(100 * DAY), 10 * DAY);
    }

    #[test]
    fn test_is_expired_boundary() {
        let now = 1_700_000_000;
        assert!(!is_expired(now - 90 * DAY, now));
        assert!(is_expired(now - 90 * DAY - 1, now));
        assert!(!is_expired(now, now));
    }
}
