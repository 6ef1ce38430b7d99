//! Price display helpers.
//!
//! Prices are carried as `rust_decimal::Decimal` end to end; the carts
//! service stores a single currency, so no currency code travels with them.

use rust_decimal::{Decimal, RoundingStrategy};

/// Format a decimal amount as a dollar string with two decimal places.
///
/// ```rust
/// # use retail_cart_core::format_price;
/// # use rust_decimal::Decimal;
/// assert_eq!(format_price(Decimal::new(1999, 2)), "$19.99");
/// assert_eq!(format_price(Decimal::new(5, 0)), "$5.00");
/// ```
#[must_use]
pub fn format_price(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("${rounded:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price_pads_to_cents() {
        assert_eq!(format_price(Decimal::new(10, 0)), "$10.00");
        assert_eq!(format_price(Decimal::new(105, 1)), "$10.50");
    }

    #[test]
    fn test_format_price_rounds_half_away_from_zero() {
        assert_eq!(format_price(Decimal::new(12345, 3)), "$12.35");
    }

    #[test]
    fn test_format_price_zero() {
        assert_eq!(format_price(Decimal::ZERO), "$0.00");
    }
}
