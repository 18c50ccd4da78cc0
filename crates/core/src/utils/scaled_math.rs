//! Arithmetic on scaled integers.
//!
//! Quantities are stored as integers scaled by an asset-class precision
//! factor (`10^decimals`), money as integers in the smallest currency unit.
//! Products are formed in `Decimal` and truncated toward zero, so no
//! fractional currency unit is ever produced.

use num_traits::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::constants::PERCENT_DECIMAL_PRECISION;
use crate::errors::{CostBasisError, Result};

/// Exact decimal value of a scaled quantity (e.g. `1_250_000` at 4 places is `125.0000`).
pub fn quantity_ratio(quantity: i64, decimals: u32) -> Decimal {
    Decimal::new(quantity, decimals)
}

/// `quantity × unit_amount`, truncated to the smallest currency unit.
pub fn scaled_amount(quantity: i64, decimals: u32, unit_amount: i64, what: &str) -> Result<i64> {
    quantity_ratio(quantity, decimals)
        .checked_mul(Decimal::from(unit_amount))
        .and_then(|product| product.trunc().to_i64())
        .ok_or_else(|| CostBasisError::Overflow(what.to_string()).into())
}

/// Per-unit amount of `total` spread over a scaled `quantity`, truncated.
/// Returns zero for a zero quantity.
pub fn per_unit_amount(total: i64, quantity: i64, decimals: u32, what: &str) -> Result<i64> {
    if quantity == 0 {
        return Ok(0);
    }
    Decimal::from(total)
        .checked_div(quantity_ratio(quantity, decimals))
        .and_then(|value| value.trunc().to_i64())
        .ok_or_else(|| CostBasisError::Overflow(what.to_string()).into())
}

/// `part / whole × 100`, or zero when `whole` is zero.
pub fn percent_of(part: i64, whole: i64) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(part) * dec!(100) / Decimal::from(whole))
        .round_dp_with_strategy(PERCENT_DECIMAL_PRECISION, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts a major-unit price (e.g. `170.25`) to smallest currency units.
pub fn to_minor_units(price: Decimal, minor_units: u32) -> Result<i64> {
    price
        .checked_mul(Decimal::from(10_i64.pow(minor_units)))
        .and_then(|value| value.trunc().to_i64())
        .ok_or_else(|| CostBasisError::Overflow(format!("price {}", price)).into())
}

pub fn checked_add(a: i64, b: i64, what: &str) -> Result<i64> {
    a.checked_add(b)
        .ok_or_else(|| CostBasisError::Overflow(what.to_string()).into())
}

/// Sums `values`, failing with `Overflow` instead of wrapping.
pub fn checked_sum<I>(values: I, what: &str) -> Result<i64>
where
    I: IntoIterator<Item = i64>,
{
    values
        .into_iter()
        .try_fold(0_i64, |total, value| checked_add(total, value, what))
}

pub fn checked_sub(a: i64, b: i64, what: &str) -> Result<i64> {
    a.checked_sub(b)
        .ok_or_else(|| CostBasisError::Overflow(what.to_string()).into())
}
