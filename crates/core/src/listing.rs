//! Auction listings and per-currency snapshots.
//!
//! Feed documents look like `{"server": [{...}, ...]}`. Field types in the
//! feed are loose (numbers sometimes arrive as strings, `datacenter` may be
//! a string or a list), so entries are normalized here before matching.

use crate::Currency;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const LISTING_URL_BASE: &str = "https://www.hetzner.com/sb#search=";

/// Errors produced while normalizing a feed document.
#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("feed document has no `server` array")]
    MissingServerList,
}

/// One server offer from the auction feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: u64,
    /// Search key used by the auction page; falls back to `id`
    pub key: Option<u64>,
    pub name: String,
    /// Price excluding VAT
    pub price_exclusive: f64,
    /// Datacenter name(s), e.g. `FSN1-DC14`
    pub locations: Vec<String>,
    pub cpu: String,
    pub ram_size_gb: u64,
    pub is_ecc: bool,
    /// Total drive capacity in GB
    pub drive_size_gb: u64,
    pub drive_count: u32,
    /// Human-readable drive summary lines
    pub drive_summary: Vec<String>,
    /// Drive kinds present in the server (`nvme`, `sata`, `hdd`, ...)
    pub drive_type_tags: Vec<String>,
    pub description: Vec<String>,
}

fn as_f64_lenient(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_u64_lenient(value: &Value) -> Option<u64> {
    as_f64_lenient(value)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
}

fn as_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Number(_) => true,
    }
}

impl Listing {
    /// Normalize one feed entry. Returns `None` when the entry has no ID or
    /// no parseable price.
    pub fn from_value(server: &Value) -> Option<Self> {
        let id = as_u64_lenient(&server["id"])?;
        let price_exclusive = as_f64_lenient(&server["price"]).filter(|p| p.is_finite())?;

        // A kind listed with no drives (`"hdd": []`) is not a tag, so
        // `drive_type=HDD` never matches a server that has none.
        let drive_type_tags = server["serverDiskData"]
            .as_object()
            .map(|kinds| {
                kinds
                    .iter()
                    .filter(|(_, drives)| is_present(drives))
                    .map(|(kind, _)| kind.clone())
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            id,
            key: as_u64_lenient(&server["key"]),
            name: server["name"].as_str().unwrap_or_default().to_string(),
            price_exclusive,
            locations: as_string_list(&server["datacenter"]),
            cpu: server["cpu"].as_str().unwrap_or_default().to_string(),
            ram_size_gb: as_u64_lenient(&server["ram_size"]).unwrap_or(0),
            is_ecc: server["is_ecc"].as_bool().unwrap_or(false),
            drive_size_gb: as_u64_lenient(&server["hdd_size"]).unwrap_or(0),
            drive_count: as_u64_lenient(&server["hdd_count"])
                .map(|count| u32::try_from(count).unwrap_or(u32::MAX))
                .unwrap_or(0),
            drive_summary: as_string_list(&server["hdd_hr"]),
            drive_type_tags,
            description: as_string_list(&server["description"]),
        })
    }

    /// Auction page link for this listing.
    pub fn url(&self) -> String {
        format!("{}{}", LISTING_URL_BASE, self.key.unwrap_or(self.id))
    }

    /// Datacenter names joined for display.
    pub fn location_display(&self) -> String {
        if self.locations.is_empty() {
            "N/A".to_string()
        } else {
            self.locations.join(", ")
        }
    }

    /// Storage line, e.g. `2x 512 GB NVMe SSD (2 drive(s))`.
    pub fn storage_display(&self) -> String {
        let summary = if !self.drive_summary.is_empty() {
            self.drive_summary.join(", ")
        } else if self.drive_size_gb > 0 {
            format!("{} GB Total", self.drive_size_gb)
        } else {
            "Details N/A".to_string()
        };
        let count = if self.drive_count > 0 {
            self.drive_count.to_string()
        } else {
            "Unknown".to_string()
        };
        format!("{} ({} drive(s))", summary, count)
    }

    /// Description lines: long items one per line, short items joined by ` - `.
    pub fn description_display(&self) -> String {
        let (long, short): (Vec<&str>, Vec<&str>) = self
            .description
            .iter()
            .map(String::as_str)
            .partition(|item| item.chars().count() > 10);

        let mut parts = Vec::new();
        if !long.is_empty() {
            parts.push(long.join("\n"));
        }
        if !short.is_empty() {
            parts.push(short.join(" - "));
        }
        if parts.is_empty() {
            "N/A".to_string()
        } else {
            parts.join("\n")
        }
    }
}

/// All current listings for one currency, in feed order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub currency: Currency,
    pub listings: Vec<Listing>,
    /// Entries dropped during normalization
    pub skipped: usize,
}

impl Snapshot {
    /// Normalize a raw feed document.
    pub fn from_json(currency: Currency, document: &Value) -> Result<Self, SnapshotError> {
        let servers = document["server"]
            .as_array()
            .ok_or(SnapshotError::MissingServerList)?;

        let listings: Vec<Listing> = servers.iter().filter_map(Listing::from_value).collect();
        let skipped = servers.len() - listings.len();

        Ok(Self {
            currency,
            listings,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_server() -> Value {
        json!({
            "id": 2471234,
            "key": 2471234,
            "name": "SB77",
            "description": ["AMD Ryzen 7 3700X", "2x SSD M.2 NVMe 1 TB", "ECC", "GPU"],
            "cpu": "AMD Ryzen 7 3700X",
            "ram_size": 64,
            "is_ecc": true,
            "price": "39.50",
            "hdd_size": 1024,
            "hdd_count": 2,
            "hdd_hr": ["2x 512 GB NVMe SSD"],
            "serverDiskData": {"nvme": [512, 512], "sata": [], "hdd": [], "general": []},
            "datacenter": "FSN1-DC14"
        })
    }

    #[test]
    fn test_listing_from_value() {
        let listing = Listing::from_value(&sample_server()).unwrap();
        assert_eq!(listing.id, 2471234);
        assert_eq!(listing.name, "SB77");
        assert!((listing.price_exclusive - 39.5).abs() < f64::EPSILON);
        assert_eq!(listing.locations, vec!["FSN1-DC14".to_string()]);
        assert_eq!(listing.ram_size_gb, 64);
        assert!(listing.is_ecc);
        assert_eq!(listing.drive_size_gb, 1024);
        assert_eq!(listing.drive_count, 2);
        assert_eq!(listing.drive_type_tags, vec!["nvme".to_string()]);
    }

    #[test]
    fn test_empty_drive_kinds_are_not_tags() {
        let mut server = sample_server();
        server["serverDiskData"] = json!({
            "nvme": [],
            "sata": [512, 512],
            "hdd": null,
            "general": []
        });
        let listing = Listing::from_value(&server).unwrap();
        assert_eq!(listing.drive_type_tags, vec!["sata".to_string()]);

        server["serverDiskData"] = json!({});
        assert!(Listing::from_value(&server).unwrap().drive_type_tags.is_empty());
    }

    #[test]
    fn test_drive_count_saturates() {
        let mut server = sample_server();
        server["hdd_count"] = json!(u64::from(u32::MAX) + 10);
        assert_eq!(Listing::from_value(&server).unwrap().drive_count, u32::MAX);

        server["hdd_count"] = json!("3");
        assert_eq!(Listing::from_value(&server).unwrap().drive_count, 3);
    }

    #[test]
    fn test_listing_datacenter_list() {
        let mut server = sample_server();
        server["datacenter"] = json!(["HEL1-DC2", "HEL1-DC6"]);
        server["price"] = json!(41.0);
        let listing = Listing::from_value(&server).unwrap();
        assert_eq!(listing.location_display(), "HEL1-DC2, HEL1-DC6");
        assert!((listing.price_exclusive - 41.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_listing_without_price_is_rejected() {
        let mut server = sample_server();
        server["price"] = json!("n/a");
        assert!(Listing::from_value(&server).is_none());

        server["price"] = Value::Null;
        assert!(Listing::from_value(&server).is_none());
    }

    #[test]
    fn test_url_prefers_key() {
        let mut listing = Listing::from_value(&sample_server()).unwrap();
        listing.key = Some(99);
        assert_eq!(listing.url(), "https://www.hetzner.com/sb#search=99");
        listing.key = None;
        assert_eq!(listing.url(), "https://www.hetzner.com/sb#search=2471234");
    }

    #[test]
    fn test_description_display() {
        let listing = Listing::from_value(&sample_server()).unwrap();
        assert_eq!(
            listing.description_display(),
            "AMD Ryzen 7 3700X\n2x SSD M.2 NVMe 1 TB\nECC - GPU"
        );
    }

    #[test]
    fn test_storage_display_fallbacks() {
        let mut listing = Listing::from_value(&sample_server()).unwrap();
        assert_eq!(listing.storage_display(), "2x 512 GB NVMe SSD (2 drive(s))");

        listing.drive_summary.clear();
        assert_eq!(listing.storage_display(), "1024 GB Total (2 drive(s))");

        listing.drive_size_gb = 0;
        listing.drive_count = 0;
        assert_eq!(listing.storage_display(), "Details N/A (Unknown drive(s))");
    }

    #[test]
    fn test_snapshot_from_json() {
        let document = json!({
            "server": [sample_server(), {"id": 1, "name": "broken"}, sample_server()]
        });
        let snapshot = Snapshot::from_json(Currency::EUR, &document).unwrap();
        assert_eq!(snapshot.listings.len(), 2);
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.currency, Currency::EUR);
    }

    #[test]
    fn test_snapshot_missing_server_list() {
        assert_eq!(
            Snapshot::from_json(Currency::USD, &json!({"server": "nope"})),
            Err(SnapshotError::MissingServerList)
        );
        assert_eq!(
            Snapshot::from_json(Currency::USD, &json!([])),
            Err(SnapshotError::MissingServerList)
        );
    }
}
