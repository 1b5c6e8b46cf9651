//! Fixed-point decimal helpers with explicit scale and rounding mode.
//!
//! The controller works with two scales: a working scale for the proportional
//! factor and an output scale for everything that leaves the core. Division and
//! multiplication are carried out on the `i128` mantissas so that the rounding
//! mode is applied exactly once, on the exact intermediate result.
//!
//! # Example
//! ```rust
//! use core::num::NonZeroU32;
//! use gleichlauf_core::utils::math::fixed_point::{ceil_div, mul_half_up, WORKING_SCALE};
//! use rust_decimal::Decimal;
//!
//! let three = NonZeroU32::new(3).unwrap();
//! let factor = ceil_div(Decimal::ONE, three, WORKING_SCALE).unwrap();
//! assert_eq!(factor.to_string(), "0.333334");
//! assert_eq!(mul_half_up(1, factor, 3).unwrap().to_string(), "0.333");
//! ```
use core::num::NonZeroU32;

use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits of the proportional factor (`gain / encoder_resolution`).
pub const WORKING_SCALE: u32 = 6;
/// Fractional digits of the correction and both motor outputs.
pub const OUTPUT_SCALE: u32 = 3;
/// Fractional digits of the measured cycle time (seconds).
pub const CYCLE_TIME_SCALE: u32 = 3;

/// Zero carrying the given scale, e.g. `0.000` for a scale of 3.
pub fn zero(scale: u32) -> Decimal {
    Decimal::new(0, scale)
}

/// Divide `dividend` by `divisor`, rounding toward positive infinity at `scale`.
///
/// Returns `None` if the quotient does not fit a `Decimal`.
pub fn ceil_div(
    dividend: Decimal,
    divisor: NonZeroU32,
    scale: u32,
) -> Option<Decimal> {
    let mantissa = dividend.mantissa();
    let divisor = i128::from(divisor.get());
    let (num, den) = if dividend.scale() <= scale {
        (mantissa.checked_mul(pow10(scale - dividend.scale())?)?, divisor)
    } else {
        (mantissa, divisor.checked_mul(pow10(dividend.scale() - scale)?)?)
    };

    // den > 0, so euclidean division floors; bump on any remainder.
    let mut quotient = num.div_euclid(den);
    if num.rem_euclid(den) != 0 {
        quotient += 1;
    }
    Decimal::try_from_i128_with_scale(quotient, scale).ok()
}

/// Multiply an integer count by `factor` and round half-up (ties away from zero) to `scale`.
///
/// Returns `None` if the product does not fit a `Decimal`.
pub fn mul_half_up(
    count: i128,
    factor: Decimal,
    scale: u32,
) -> Option<Decimal> {
    let product = count.checked_mul(factor.mantissa())?;
    let mantissa = if factor.scale() <= scale {
        product.checked_mul(pow10(scale - factor.scale())?)?
    } else {
        let step = pow10(factor.scale() - scale)?;
        let quotient = product / step;
        let remainder = (product % step).abs();
        if remainder * 2 >= step {
            quotient + product.signum()
        } else {
            quotient
        }
    };
    Decimal::try_from_i128_with_scale(mantissa, scale).ok()
}

/// Round `value` half-up to exactly `scale` fractional digits.
///
/// Pads with trailing zeros when `value` carries fewer digits and never yields
/// a negative zero. Returns `None` if the integer part leaves no room for
/// `scale` fractional digits.
pub fn rescale_half_up(
    value: Decimal,
    scale: u32,
) -> Option<Decimal> {
    let mut out = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    out.rescale(scale);
    if out.scale() != scale {
        return None;
    }
    if out.is_zero() {
        out.set_sign_positive(true);
    }
    Some(out)
}

/// Normalize a value to [`OUTPUT_SCALE`] with half-up rounding.
pub fn to_output(value: Decimal) -> Option<Decimal> {
    rescale_half_up(value, OUTPUT_SCALE)
}

fn pow10(exp: u32) -> Option<i128> {
    10i128.checked_pow(exp)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use rust_decimal_macros::dec;
    use std::string::ToString;

    fn nz(v: u32) -> NonZeroU32 {
        NonZeroU32::new(v).unwrap()
    }

    #[test]
    fn test_ceil_div_exact() {
        let q = ceil_div(dec!(2.0), nz(100), WORKING_SCALE).unwrap();
        assert_eq!(q.to_string(), "0.020000");
    }

    #[test]
    fn test_ceil_div_rounds_up_positive() {
        // 1/3 = 0.333333..., ceiling never drops the repeating tail
        let q = ceil_div(dec!(1), nz(3), WORKING_SCALE).unwrap();
        assert_eq!(q.to_string(), "0.333334");
        assert!(q > dec!(1) / dec!(3));
    }

    #[test]
    fn test_ceil_div_rounds_toward_positive_infinity_for_negatives() {
        let q = ceil_div(dec!(-1), nz(3), WORKING_SCALE).unwrap();
        assert_eq!(q.to_string(), "-0.333333");
    }

    #[test]
    fn test_ceil_div_high_scale_dividend() {
        // 0.00000010 / 1 -> 0.000001 (inexact at scale 6, rounds up)
        let q = ceil_div(dec!(0.0000001), nz(1), WORKING_SCALE).unwrap();
        assert_eq!(q.to_string(), "0.000001");
        let q = ceil_div(dec!(-0.0000009), nz(1), WORKING_SCALE).unwrap();
        assert!(q.is_zero());
    }

    #[test]
    fn test_mul_half_up_ties_away_from_zero() {
        assert_eq!(mul_half_up(1, dec!(0.0005), 3).unwrap().to_string(), "0.001");
        assert_eq!(mul_half_up(-1, dec!(0.0005), 3).unwrap().to_string(), "-0.001");
        assert_eq!(mul_half_up(1, dec!(0.000499), 3).unwrap().to_string(), "0.000");
    }

    #[test]
    fn test_mul_half_up_pads_scale() {
        assert_eq!(mul_half_up(50, dec!(0.02), 3).unwrap().to_string(), "1.000");
        assert_eq!(mul_half_up(0, dec!(7.123456), 3).unwrap().to_string(), "0.000");
    }

    #[test]
    fn test_mul_half_up_overflow_is_none() {
        assert!(mul_half_up(i128::from(i64::MAX), Decimal::MAX, 3).is_none());
    }

    #[test]
    fn test_rescale_half_up() {
        assert_eq!(rescale_half_up(dec!(12.5), 3).unwrap().to_string(), "12.500");
        assert_eq!(rescale_half_up(dec!(1.2345), 3).unwrap().to_string(), "1.235");
        assert_eq!(rescale_half_up(dec!(-1.2345), 3).unwrap().to_string(), "-1.235");
        assert_eq!(rescale_half_up(dec!(-0.0004), 3).unwrap().to_string(), "0.000");
    }

    #[test]
    fn test_rescale_half_up_without_room_is_none() {
        assert!(rescale_half_up(Decimal::MAX, OUTPUT_SCALE).is_none());
        assert!(to_output(Decimal::MIN).is_none());
        let big = Decimal::from_i128_with_scale(10i128.pow(24), 0);
        assert_eq!(to_output(big).unwrap().scale(), OUTPUT_SCALE);
    }

    #[test]
    fn test_zero_carries_scale() {
        assert_eq!(zero(OUTPUT_SCALE).to_string(), "0.000");
    }
}
