//! User alert filters for the server auction.

use crate::price::max_exclusive_price;
use crate::Currency;
use serde::{Deserialize, Serialize};

/// Datacenter region a filter can be pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datacenter {
    /// Nuremberg
    NBG,
    /// Falkenstein
    FSN,
    /// Helsinki
    HEL,
}

impl Datacenter {
    /// Parse a user choice. `Ok(None)` is the "All" sentinel.
    pub fn parse(s: &str) -> Result<Option<Self>, String> {
        match s.trim().to_uppercase().as_str() {
            "ALL" => Ok(None),
            "NBG" => Ok(Some(Datacenter::NBG)),
            "FSN" => Ok(Some(Datacenter::FSN)),
            "HEL" => Ok(Some(Datacenter::HEL)),
            other => Err(other.to_string()),
        }
    }

    /// Prefix used in the feed's datacenter names (e.g. `FSN1-DC14`).
    pub fn as_str(self) -> &'static str {
        match self {
            Datacenter::NBG => "NBG",
            Datacenter::FSN => "FSN",
            Datacenter::HEL => "HEL",
        }
    }
}

/// CPU vendor a filter can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuVendor {
    Amd,
    Intel,
}

impl CpuVendor {
    /// Parse a user choice. `Ok(None)` is the "Any" sentinel.
    pub fn parse(s: &str) -> Result<Option<Self>, String> {
        match s.trim().to_uppercase().as_str() {
            "ANY" => Ok(None),
            "AMD" => Ok(Some(CpuVendor::Amd)),
            "INTEL" => Ok(Some(CpuVendor::Intel)),
            other => Err(other.to_string()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CpuVendor::Amd => "AMD",
            CpuVendor::Intel => "Intel",
        }
    }
}

/// Drive technology a filter can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveType {
    Nvme,
    Sata,
    Hdd,
}

impl DriveType {
    /// Parse a user choice. `Ok(None)` is the "Any" sentinel.
    pub fn parse(s: &str) -> Result<Option<Self>, String> {
        match s.trim().to_uppercase().as_str() {
            "ANY" => Ok(None),
            "NVME" => Ok(Some(DriveType::Nvme)),
            "SATA" | "SSD" => Ok(Some(DriveType::Sata)),
            "HDD" => Ok(Some(DriveType::Hdd)),
            other => Err(other.to_string()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DriveType::Nvme => "NVMe",
            DriveType::Sata => "SATA",
            DriveType::Hdd => "HDD",
        }
    }
}

/// Matching constraints of a filter.
///
/// `None` (or `false` for `require_ecc`) means the constraint is inactive.
/// Zero-valued limits are never stored as `Some(0)`; use [`FilterCriteria::normalized`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Maximum price, VAT-inclusive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<u32>,
    /// VAT percentage (0-100) the limit includes
    pub vat_percentage: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Datacenter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_vendor: Option<CpuVendor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_ram_gb: Option<u32>,
    pub require_ecc: bool,
    /// Minimum total drive capacity in GB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_drive_size_gb: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_drive_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_type: Option<DriveType>,
}

fn non_zero(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v > 0)
}

impl FilterCriteria {
    /// Drop `Some(0)` limits so that every inactive constraint is `None`.
    pub fn normalized(self) -> Self {
        Self {
            max_price: non_zero(self.max_price),
            vat_percentage: self.vat_percentage.min(100),
            min_ram_gb: non_zero(self.min_ram_gb),
            min_drive_size_gb: non_zero(self.min_drive_size_gb),
            min_drive_count: non_zero(self.min_drive_count),
            ..self
        }
    }

    /// Largest VAT-exclusive listing price this filter accepts, if limited.
    pub fn max_exclusive_price(&self) -> Option<f64> {
        non_zero(self.max_price)
            .map(|limit| max_exclusive_price(f64::from(limit), self.vat_percentage))
    }

    /// True when no constraint is active; such a filter matches every listing.
    pub fn is_unconstrained(&self) -> bool {
        self.describe(Currency::default()).is_empty()
    }

    /// Human-readable lines for every active constraint.
    pub fn describe(&self, currency: Currency) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(price) = non_zero(self.max_price) {
            if self.vat_percentage > 0 {
                lines.push(format!(
                    "Max Price: {} {} (incl. {}% VAT)",
                    price, currency, self.vat_percentage
                ));
            } else {
                lines.push(format!("Max Price: {} {}", price, currency));
            }
        }
        if let Some(location) = self.location {
            lines.push(format!("Location: {}", location.as_str()));
        }
        if let Some(cpu) = self.cpu_vendor {
            lines.push(format!("CPU: {}", cpu.as_str()));
        }
        if let Some(ram) = non_zero(self.min_ram_gb) {
            lines.push(format!("Min RAM: {}GB", ram));
        }
        if self.require_ecc {
            lines.push("RAM must be ECC".to_string());
        }
        if let Some(size) = non_zero(self.min_drive_size_gb) {
            lines.push(format!("Min Drive Size: {}GB", size));
        }
        if let Some(count) = non_zero(self.min_drive_count) {
            lines.push(format!("Min Drive Count: {}", count));
        }
        if let Some(drive_type) = self.drive_type {
            lines.push(format!("Drive Type: {}", drive_type.as_str()));
        }
        lines
    }
}

/// A stored subscription. Never mutated after creation, only deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionFilter {
    /// Store-assigned ID
    pub id: i64,
    /// Subscriber (Telegram user ID)
    pub owner_id: i64,
    pub currency: Currency,
    pub criteria: FilterCriteria,
    /// Creation time, epoch seconds
    pub created_at: i64,
}
