//! VAT price conversion.
//!
//! Feed prices are VAT-exclusive while users state their limit VAT-inclusive.

/// Multiplier that turns a VAT-exclusive price into a VAT-inclusive one.
pub fn vat_factor(vat_percentage: u8) -> f64 {
    1.0 + f64::from(vat_percentage) / 100.0
}

/// Largest VAT-exclusive price a user with this inclusive limit accepts.
pub fn max_exclusive_price(limit_inclusive: f64, vat_percentage: u8) -> f64 {
    limit_inclusive / vat_factor(vat_percentage)
}

/// Price the user actually pays for a VAT-exclusive feed price.
pub fn inclusive_price(price_exclusive: f64, vat_percentage: u8) -> f64 {
    price_exclusive * vat_factor(vat_percentage)
}

/// Format a price with two decimals and its currency code.
pub fn format_price(price: f64, currency: crate::Currency) -> String {
    format!("{:.2} {}", price, currency)
}
