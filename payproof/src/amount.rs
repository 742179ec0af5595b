//! Token amounts in base units and their decimal normalization.
//!
//! On-chain transfers carry integer amounts in the token's smallest unit
//! (e.g., 1_000_000 for 1 USDC with 6 decimals). Policy thresholds and
//! user-facing values are expressed as [`Decimal`]; this module converts
//! between the two without going through floating point.

use rust_decimal::Decimal;

/// An integer token amount in base units, paired with the token's decimal
/// precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseUnits {
    /// Amount in the token's smallest unit.
    pub raw: u128,
    /// Number of decimal places the token uses.
    pub decimals: u8,
}

impl BaseUnits {
    /// Creates a new base-unit amount.
    #[must_use]
    pub const fn new(raw: u128, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    /// Normalizes the amount to a [`Decimal`] (e.g., `1_500_000` with 6
    /// decimals becomes `1.5`).
    ///
    /// Amounts beyond [`i128::MAX`] base units saturate; no real token
    /// supply reaches that range.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        let raw = i128::try_from(self.raw).unwrap_or(i128::MAX);
        Decimal::from_i128_with_scale(raw, u32::from(self.decimals)).normalize()
    }
}

/// Converts a decimal amount to base units for the given precision.
///
/// Rounds down; a threshold of `0.105` at 2 decimals becomes `10` base
/// units. Negative amounts clamp to zero.
#[must_use]
pub fn to_base_units(amount: Decimal, decimals: u8) -> u128 {
    let scaled = amount * Decimal::from(10u128.pow(u32::from(decimals)));
    let truncated = scaled.trunc();
    if truncated.is_sign_negative() {
        return 0;
    }
    u128::try_from(truncated.mantissa() / 10i128.pow(truncated.scale())).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_base_units_to_decimal() {
        let amount = BaseUnits::new(1_500_000, 6);
        assert_eq!(amount.to_decimal(), Decimal::from_str("1.5").unwrap());
    }

    #[test]
    fn test_zero_decimals() {
        let amount = BaseUnits::new(42, 0);
        assert_eq!(amount.to_decimal(), Decimal::from(42));
    }

    #[test]
    fn test_sub_unit_amount() {
        let amount = BaseUnits::new(5, 6);
        assert_eq!(amount.to_decimal(), Decimal::from_str("0.000005").unwrap());
    }

    #[test]
    fn test_to_base_units_roundtrip() {
        let decimal = Decimal::from_str("0.10").unwrap();
        assert_eq!(to_base_units(decimal, 6), 100_000);
        assert_eq!(BaseUnits::new(100_000, 6).to_decimal(), decimal.normalize());
    }

    #[test]
    fn test_to_base_units_truncates() {
        let decimal = Decimal::from_str("0.0000019").unwrap();
        assert_eq!(to_base_units(decimal, 6), 1);
    }

    #[test]
    fn test_negative_clamps_to_zero() {
        let decimal = Decimal::from_str("-1").unwrap();
        assert_eq!(to_base_units(decimal, 6), 0);
    }
}
