//! Price and range math for V3-style concentrated-liquidity pools
//!
//! All conversions from on-chain fixed-point values go through integer
//! arithmetic (`U512` widening); floats only appear in the logarithmic
//! tick search where one-tick accuracy is sufficient. A squared 160-bit
//! sqrt price does not fit 64-bit integers and a double loses the
//! low-order digits that distinguish stablecoin prices near parity.

use crate::errors::MathError;
use alloy_primitives::{I256, U256, U512};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use uniswap_v3_math::tick_math::{get_sqrt_ratio_at_tick, MAX_TICK, MIN_TICK};

/// Fractional digits shown to users
pub const DISPLAY_DECIMALS: u32 = 8;

/// Internal decimal scales tried from most to least precise. A price is
/// stored at the finest scale whose mantissa still fits `Decimal`.
const SCALE_LADDER: [u32; 5] = [18, 12, 8, 4, 0];

/// A pool price in token1-per-token0 terms.
///
/// `Infinite` covers the degenerate states a pool can legitimately be in:
/// a zero sqrt price and magnitudes beyond what `Decimal` can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPrice {
    Finite(Decimal),
    Infinite,
}

impl PoolPrice {
    pub fn finite(&self) -> Option<Decimal> {
        match self {
            PoolPrice::Finite(value) => Some(*value),
            PoolPrice::Infinite => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, PoolPrice::Infinite)
    }

    /// Fixed-width rendering with `DISPLAY_DECIMALS` fractional digits.
    pub fn display(&self) -> String {
        match self {
            PoolPrice::Finite(value) => {
                format!("{:.prec$}", value, prec = DISPLAY_DECIMALS as usize)
            }
            PoolPrice::Infinite => "inf".to_string(),
        }
    }
}

impl PartialOrd for PoolPrice {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        use std::cmp::Ordering;
        match (self, other) {
            (PoolPrice::Finite(a), PoolPrice::Finite(b)) => a.partial_cmp(b),
            (PoolPrice::Finite(_), PoolPrice::Infinite) => Some(Ordering::Less),
            (PoolPrice::Infinite, PoolPrice::Finite(_)) => Some(Ordering::Greater),
            (PoolPrice::Infinite, PoolPrice::Infinite) => Some(Ordering::Equal),
        }
    }
}

impl fmt::Display for PoolPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

fn pow10(exp: u32) -> U512 {
    U512::from(10u64).pow(U512::from(exp))
}

/// Convert a Q64.96 sqrt price into a human price:
/// `(sqrtPriceX96^2 / 2^192) * 10^(decimals0 - decimals1)`.
///
/// Deterministic and monotonic in `sqrt_price_x96`. A zero input yields
/// the infinite sentinel rather than an error.
pub fn price_from_sqrt_x96(sqrt_price_x96: U256, decimals0: u8, decimals1: u8) -> PoolPrice {
    if sqrt_price_x96.is_zero() {
        return PoolPrice::Infinite;
    }

    let squared = U512::from(sqrt_price_x96) * U512::from(sqrt_price_x96);
    let numerator = squared * pow10(decimals0 as u32);
    let denominator = (U512::from(1u64) << 192) * pow10(decimals1 as u32);

    match decimal_from_ratio(numerator, denominator) {
        Some(value) => PoolPrice::Finite(value),
        None => PoolPrice::Infinite,
    }
}

/// Render an integer ratio as a `Decimal`, preferring the finest scale on
/// the ladder whose mantissa still fits. `None` when even scale 0 overflows.
fn decimal_from_ratio(numerator: U512, denominator: U512) -> Option<Decimal> {
    for scale in SCALE_LADDER {
        let scaled = numerator * pow10(scale) / denominator;
        let Ok(mantissa) = i128::try_from(scaled) else {
            continue;
        };
        if let Ok(value) = Decimal::try_from_i128_with_scale(mantissa, scale) {
            return Some(value);
        }
    }
    None
}

/// Price at an exact tick boundary: `1.0001^tick` adjusted for decimals.
pub fn price_at_tick(tick: i32, decimals0: u8, decimals1: u8) -> Result<PoolPrice, MathError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(MathError::TickOutOfRange(tick));
    }
    let sqrt_ratio = get_sqrt_ratio_at_tick(tick).map_err(MathError::from)?;
    Ok(price_from_sqrt_x96(sqrt_ratio, decimals0, decimals1))
}

/// Closest tick for a human price, inverse of [`price_at_tick`] to within
/// one tick. Uses the base-1.0001 logarithm; sub-tick accuracy is not
/// needed anywhere in the crate.
pub fn tick_at_price(price: &PoolPrice, decimals0: u8, decimals1: u8) -> Result<i32, MathError> {
    let value = price.finite().ok_or(MathError::PriceUnavailable)?;
    let value = value.to_f64().ok_or(MathError::PriceUnavailable)?;
    if value <= 0.0 {
        return Err(MathError::PriceUnavailable);
    }

    // Undo the decimal adjustment to recover the raw reserve ratio.
    let raw_ratio = value * 10f64.powi(decimals1 as i32 - decimals0 as i32);
    let tick = (raw_ratio.ln() / 1.0001f64.ln()).round();
    if !tick.is_finite() {
        return Err(MathError::PriceUnavailable);
    }
    let tick = tick as i32;
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(MathError::TickOutOfRange(tick));
    }
    Ok(tick)
}

/// Canonical in-range predicate, used by both the position model and the
/// monitor: inclusive lower bound, exclusive upper bound (on-chain
/// semantics). A position sitting exactly on its upper tick is out.
pub fn in_range(current_tick: i32, tick_lower: i32, tick_upper: i32) -> bool {
    tick_lower <= current_tick && current_tick < tick_upper
}

/// Convert a raw integer token amount into decimal units.
pub fn amount_to_decimal(raw: U256, decimals: u8) -> Result<Decimal, MathError> {
    let mantissa = i128::try_from(raw)
        .map_err(|_| MathError::AmountOverflow(raw.to_string()))?;
    Decimal::try_from_i128_with_scale(mantissa, decimals as u32)
        .map_err(|_| MathError::AmountOverflow(raw.to_string()))
}

/// Absolute value of a signed swap amount in decimal units.
pub fn signed_amount_to_decimal(raw: I256, decimals: u8) -> Result<Decimal, MathError> {
    amount_to_decimal(raw.unsigned_abs(), decimals)
}
