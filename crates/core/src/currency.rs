//! Currencies offered by the auction feeds.

use serde::{Deserialize, Serialize};

/// Billing currency of an auction feed.
///
/// Each currency has its own snapshot; a filter only ever matches against
/// the snapshot of its own currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    EUR,
    USD,
}

impl Currency {
    /// All currencies in feed fetch order.
    pub const ALL: [Currency; 2] = [Currency::USD, Currency::EUR];

    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "EUR" => Some(Currency::EUR),
            "USD" => Some(Currency::USD),
            _ => None,
        }
    }

    /// Get display name.
    pub fn as_str(self) -> &'static str {
        match self {
            Currency::EUR => "EUR",
            Currency::USD => "USD",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
