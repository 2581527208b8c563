//! Conversion of raw fixed-precision chain integers into decimal values.
//!
//! All value arithmetic in this crate runs on [`rust_decimal::Decimal`], never
//! floating point, so additive updates stay exact across millions of events.

use rust_decimal::Decimal;

/// Fixed-point scale used by the protocol's token amounts.
pub const UNIT_DECIMALS: u32 = 18;

/// Largest mantissa a `Decimal` can carry (96 bits).
const MAX_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;

/// Convert a raw scaled integer into a decimal value.
///
/// `digits` is the number of base-10 fractional digits the raw integer is
/// scaled by. A scale beyond the supported 28 digits is a programming-contract
/// violation and panics; it is not a recoverable runtime condition.
///
/// Raw values whose mantissa exceeds 96 bits have their least-significant
/// fractional digits dropped until they fit; this only rounds inside the
/// fractional tail, significant digits are never lost.
pub fn to_decimal(raw: u128, digits: u32) -> Decimal {
    assert!(digits <= 28, "decimal scale {digits} beyond supported precision");

    let mut mantissa = raw;
    let mut scale = digits;
    while mantissa > MAX_MANTISSA && scale > 0 {
        mantissa /= 10;
        scale -= 1;
    }
    assert!(
        mantissa <= MAX_MANTISSA,
        "raw integer {raw} out of range for decimal conversion"
    );

    Decimal::from_i128_with_scale(mantissa as i128, scale)
}

/// Convert a raw integer scaled by the protocol's standard 18 digits.
pub fn to_decimal_18(raw: u128) -> Decimal {
    to_decimal(raw, UNIT_DECIMALS)
}

/// Convert an asset-denominated raw amount into the unit of account using the
/// supplied exchange rate.
pub fn usd_from_asset(raw: u128, rate: Decimal) -> Decimal {
    to_decimal_18(raw) * rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn to_decimal_scales_by_digits() {
        assert_eq!(to_decimal(1_500_000_000_000_000_000, 18), dec!(1.5));
        assert_eq!(to_decimal(3, 3), dec!(0.003));
        assert_eq!(to_decimal(250, 0), dec!(250));
    }

    #[test]
    fn to_decimal_zero() {
        assert_eq!(to_decimal(0, 18), Decimal::ZERO);
    }

    #[test]
    fn oversized_mantissa_drops_fractional_tail_only() {
        // u128::MAX has 39 digits; with scale 18 the integral part fits easily
        // inside 28 significant digits after tail truncation.
        let v = to_decimal(u128::MAX, 18);
        assert!(v > dec!(340_282_366_920_938_463_463));
        assert!(v < dec!(340_282_366_920_938_463_464));
    }

    #[test]
    #[should_panic(expected = "beyond supported precision")]
    fn excessive_scale_is_fatal() {
        to_decimal(1, 29);
    }

    #[test]
    fn usd_conversion_applies_rate() {
        // 2.0 tokens at a rate of 3.25 per token
        let usd = usd_from_asset(2_000_000_000_000_000_000, dec!(3.25));
        assert_eq!(usd, dec!(6.5));
    }

    #[test]
    fn addition_is_order_independent() {
        let a = to_decimal(333_333_333_333_333_333, 18);
        let b = to_decimal(666_666_666_666_666_667, 18);
        let c = to_decimal(1, 18);
        assert_eq!((a + b) + c, a + (b + c));
    }
}
