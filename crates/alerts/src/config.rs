//! Filter registration requests.
//!
//! `/hetzner` takes `key=value` arguments. Every field of [`FilterRequest`]
//! records whether the user provided it; defaults and sentinels are only
//! resolved in [`FilterRequest::into_criteria`].

use librebot_core::{CpuVendor, Currency, Datacenter, DriveType, FilterCriteria};
use thiserror::Error;

/// Most filters a single user may hold at once.
pub const MAX_FILTERS_PER_USER: i64 = 10;

/// Seconds between two `/hetzner` invocations of the same user.
pub const COMMAND_COOLDOWN_SECS: i64 = 5;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterRequestError {
    #[error("Unknown option `{0}`")]
    UnknownOption(String),
    #[error("Expected key=value, got `{0}`")]
    Malformed(String),
    #[error("Option `{0}` given more than once")]
    Duplicate(&'static str),
    #[error("`{key}` must be a whole number between {min} and {max}")]
    OutOfRange {
        key: &'static str,
        min: u32,
        max: u32,
    },
    #[error("`{key}` must be one of: {allowed}")]
    InvalidChoice {
        key: &'static str,
        allowed: &'static str,
    },
}

/// Options submitted with `/hetzner`. `None` means "not provided".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterRequest {
    pub price: Option<u32>,
    pub vat_percentage: Option<u8>,
    pub currency: Option<Currency>,
    /// `Some(None)` is an explicit "All"
    pub location: Option<Option<Datacenter>>,
    pub cpu: Option<Option<CpuVendor>>,
    pub ram: Option<u32>,
    pub ecc: Option<bool>,
    pub drive_size: Option<u32>,
    pub drive_count: Option<u32>,
    pub drive_type: Option<Option<DriveType>>,
}

fn set_once<T>(slot: &mut Option<T>, key: &'static str, value: T) -> Result<(), FilterRequestError> {
    if slot.is_some() {
        return Err(FilterRequestError::Duplicate(key));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_bounded(key: &'static str, value: &str, max: u32) -> Result<u32, FilterRequestError> {
    value
        .parse::<u32>()
        .ok()
        .filter(|v| *v <= max)
        .ok_or(FilterRequestError::OutOfRange { key, min: 0, max })
}

fn parse_choice<T>(
    key: &'static str,
    value: &str,
    allowed: &'static str,
    parse: fn(&str) -> Result<Option<T>, String>,
) -> Result<Option<T>, FilterRequestError> {
    parse(value).map_err(|_| FilterRequestError::InvalidChoice { key, allowed })
}

impl FilterRequest {
    /// Parse the argument string of `/hetzner`, e.g. `price=50 vat=19 ram=32`.
    pub fn parse(args: &str) -> Result<Self, FilterRequestError> {
        let mut request = FilterRequest::default();

        for token in args.split_whitespace() {
            let (key, value) = token
                .split_once('=')
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .ok_or_else(|| FilterRequestError::Malformed(token.to_string()))?;

            match key.to_lowercase().as_str() {
                "price" => set_once(&mut request.price, "price", parse_bounded("price", value, 1000)?)?,
                "vat" | "vat_percentage" => {
                    let vat = parse_bounded("vat", value, 100)? as u8;
                    set_once(&mut request.vat_percentage, "vat", vat)?
                }
                "currency" => {
                    let currency = Currency::from_str(value).ok_or(FilterRequestError::InvalidChoice {
                        key: "currency",
                        allowed: "EUR, USD",
                    })?;
                    set_once(&mut request.currency, "currency", currency)?
                }
                "location" => {
                    let location = parse_choice("location", value, "All, NBG, FSN, HEL", Datacenter::parse)?;
                    set_once(&mut request.location, "location", location)?
                }
                "cpu" | "cpu_type" => {
                    let cpu = parse_choice("cpu", value, "Any, AMD, Intel", CpuVendor::parse)?;
                    set_once(&mut request.cpu, "cpu", cpu)?
                }
                "ram" | "ram_size" => set_once(&mut request.ram, "ram", parse_bounded("ram", value, 1024)?)?,
                "ecc" | "ram_ecc" => {
                    let ecc = match value.to_lowercase().as_str() {
                        "true" | "yes" | "1" => true,
                        "false" | "no" | "0" => false,
                        _ => {
                            return Err(FilterRequestError::InvalidChoice {
                                key: "ecc",
                                allowed: "true, false",
                            })
                        }
                    };
                    set_once(&mut request.ecc, "ecc", ecc)?
                }
                "drive_size" => set_once(
                    &mut request.drive_size,
                    "drive_size",
                    parse_bounded("drive_size", value, 30000)?,
                )?,
                "drive_count" => set_once(
                    &mut request.drive_count,
                    "drive_count",
                    parse_bounded("drive_count", value, 16)?,
                )?,
                "drive_type" => {
                    let drive_type =
                        parse_choice("drive_type", value, "Any, NVMe, SATA, HDD", DriveType::parse)?;
                    set_once(&mut request.drive_type, "drive_type", drive_type)?
                }
                _ => return Err(FilterRequestError::UnknownOption(key.to_string())),
            }
        }

        Ok(request)
    }

    /// Currency the filter is stored under (EUR unless given).
    pub fn currency(&self) -> Currency {
        self.currency.unwrap_or_default()
    }

    /// Resolve defaults and sentinels into matching constraints.
    pub fn into_criteria(self) -> FilterCriteria {
        FilterCriteria {
            max_price: self.price,
            vat_percentage: self.vat_percentage.unwrap_or(0),
            location: self.location.flatten(),
            cpu_vendor: self.cpu.flatten(),
            min_ram_gb: self.ram,
            require_ecc: self.ecc.unwrap_or(false),
            min_drive_size_gb: self.drive_size,
            min_drive_count: self.drive_count,
            drive_type: self.drive_type.flatten(),
        }
        .normalized()
    }
}

/// Usage text for `/hetzner`.
pub const HETZNER_USAGE: &str = "Usage: /hetzner [key=value ...]\n\
    price=0-1000 (VAT-inclusive max, 0 = any)\n\
    vat=0-100\n\
    currency=EUR|USD\n\
    location=All|NBG|FSN|HEL\n\
    cpu=Any|AMD|Intel\n\
    ram=0-1024 (min GB)\n\
    ecc=true|false\n\
    drive_size=0-30000 (min total GB)\n\
    drive_count=0-16\n\
    drive_type=Any|NVMe|SATA|HDD\n\
    Example: /hetzner price=50 vat=19 ram=64 location=FSN";
