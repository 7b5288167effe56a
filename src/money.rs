//! Money helpers shared by room pricing and payment adjustments.

use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};

/// Calculate `percent` (whole percentage points, e.g. `10` for 10%) of a
/// minor unit amount, rounding midpoints away from zero.
///
/// Returns `None` when the calculation overflows or cannot be represented
/// in minor units.
pub(crate) fn percent_of_minor(percent: Decimal, minor: i64) -> Option<i64> {
    let fraction = percent.checked_div(Decimal::ONE_HUNDRED)?;
    let minor = Decimal::from_i64(minor)?;
    let applied = fraction.checked_mul(minor)?;

    let rounded = applied.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    rounded.to_i64()
}

/// Convert a major unit decimal amount into minor units for a currency with
/// the given exponent (e.g. `150.00` with exponent 2 becomes `15000`).
///
/// Returns `None` when the amount has more precision than the currency
/// carries, or when the conversion overflows.
pub(crate) fn to_minor_units(amount: Decimal, exponent: u32) -> Option<i64> {
    let scale = Decimal::from_i64(10_i64.checked_pow(exponent)?)?;
    let scaled = amount.checked_mul(scale)?;

    if scaled != scaled.trunc() {
        return None;
    }

    scaled.to_i64()
}
