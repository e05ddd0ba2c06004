//! Filter-to-listing matching.
//!
//! A listing matches when every active constraint of the filter holds.
//! For a whole snapshot the first matching listing in feed order wins; it is
//! not necessarily the cheapest.

use crate::{FilterCriteria, Listing};

/// A single filter constraint, used to report why a listing was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Price,
    Location,
    Cpu,
    Ram,
    Ecc,
    DriveSize,
    DriveCount,
    DriveType,
}

/// Return the first active constraint the listing fails, or `None` if it matches.
pub fn first_failed_constraint(criteria: &FilterCriteria, listing: &Listing) -> Option<Constraint> {
    if let Some(max_exclusive) = criteria.max_exclusive_price() {
        if listing.price_exclusive > max_exclusive {
            return Some(Constraint::Price);
        }
    }

    if let Some(location) = criteria.location {
        let wanted = location.as_str();
        if !listing.locations.iter().any(|dc| dc.contains(wanted)) {
            return Some(Constraint::Location);
        }
    }

    if let Some(vendor) = criteria.cpu_vendor {
        if !listing
            .cpu
            .to_uppercase()
            .contains(&vendor.as_str().to_uppercase())
        {
            return Some(Constraint::Cpu);
        }
    }

    if let Some(min_ram) = criteria.min_ram_gb.filter(|v| *v > 0) {
        if listing.ram_size_gb < u64::from(min_ram) {
            return Some(Constraint::Ram);
        }
    }

    if criteria.require_ecc && !listing.is_ecc {
        return Some(Constraint::Ecc);
    }

    if let Some(min_size) = criteria.min_drive_size_gb.filter(|v| *v > 0) {
        if listing.drive_size_gb < u64::from(min_size) {
            return Some(Constraint::DriveSize);
        }
    }

    if let Some(min_count) = criteria.min_drive_count.filter(|v| *v > 0) {
        if listing.drive_count < min_count {
            return Some(Constraint::DriveCount);
        }
    }

    if let Some(drive_type) = criteria.drive_type {
        let wanted = drive_type.as_str().to_uppercase();
        if !listing
            .drive_type_tags
            .iter()
            .any(|tag| tag.to_uppercase().contains(&wanted))
        {
            return Some(Constraint::DriveType);
        }
    }

    None
}

/// Check whether a listing satisfies every active constraint.
pub fn matches(criteria: &FilterCriteria, listing: &Listing) -> bool {
    first_failed_constraint(criteria, listing).is_none()
}

/// Find the first listing, in snapshot order, that satisfies the filter.
pub fn find_first_match<'a>(criteria: &FilterCriteria, listings: &'a [Listing]) -> Option<&'a Listing> {
    listings.iter().find(|listing| matches(criteria, listing))
}
