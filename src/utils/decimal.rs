//! Decimal arithmetic utilities for prices, quantities and percentages.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Round a price to cents. Midpoints go to the even neighbour.
pub fn round_to_cents(value: Decimal) -> Decimal {
    value.round_dp(2)
}

/// Round to the nearest whole unit, midpoints to even.
pub fn round_whole(value: Decimal) -> Decimal {
    value.round()
}

/// Drop the fractional part (towards zero).
pub fn truncate_whole(value: Decimal) -> Decimal {
    value.trunc()
}

/// Share of `total` represented by `pct` percent.
pub fn percent_of(pct: Decimal, total: Decimal) -> Decimal {
    pct / dec!(100) * total
}

/// Safe division that returns zero if divisor is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Whole-share quantity purchasable with `cash` at `price`, rounded to nearest.
pub fn whole_shares(cash: Decimal, price: Decimal) -> i64 {
    use rust_decimal::prelude::ToPrimitive;

    round_whole(safe_div(cash, price)).to_i64().unwrap_or(0)
}
