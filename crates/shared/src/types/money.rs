//! Minor-unit money codec.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Decimal amounts exist only at the API boundary; everything past this
//! codec stores and computes on integer minor units (e.g., kobo for NGN).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of minor units per major currency unit.
pub const MINOR_UNIT_FACTOR: i64 = 100;

/// Errors produced by the money codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    /// Amount must be strictly positive.
    #[error("amount must be positive, got {0}")]
    NotPositive(Decimal),

    /// Amount does not fit the minor-unit integer range.
    #[error("amount {0} is out of range for minor units")]
    OutOfRange(Decimal),
}

impl From<MoneyError> for crate::error::AppError {
    fn from(err: MoneyError) -> Self {
        Self::InvalidAmount(err.to_string())
    }
}

/// Converts a decimal currency amount to integer minor units.
///
/// Multiplies by [`MINOR_UNIT_FACTOR`] and rounds to the nearest integer
/// (midpoint away from zero).
///
/// # Errors
///
/// Returns `MoneyError::NotPositive` for zero or negative amounts (or
/// amounts that round down to zero minor units), and
/// `MoneyError::OutOfRange` when the result does not fit an `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount <= Decimal::ZERO {
        return Err(MoneyError::NotPositive(amount));
    }

    let scaled = amount
        .checked_mul(Decimal::from(MINOR_UNIT_FACTOR))
        .ok_or(MoneyError::OutOfRange(amount))?;
    let minor = scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(MoneyError::OutOfRange(amount))?;

    if minor <= 0 {
        return Err(MoneyError::NotPositive(amount));
    }
    Ok(minor)
}

/// Converts integer minor units back to a decimal amount for display.
#[must_use]
pub fn from_minor_units(minor_units: i64) -> Decimal {
    Decimal::new(minor_units, 2)
}

/// Returns true iff the value is a valid stored amount: a positive integer
/// number of minor units.
#[must_use]
pub const fn is_valid_amount(minor_units: i64) -> bool {
    minor_units > 0
}

/// ISO 4217 currency codes supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Nigerian Naira (minor unit: kobo).
    Ngn,
    /// US Dollar.
    Usd,
    /// Ghanaian Cedi.
    Ghs,
    /// Kenyan Shilling.
    Kes,
    /// South African Rand.
    Zar,
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ngn => write!(f, "NGN"),
            Self::Usd => write!(f, "USD"),
            Self::Ghs => write!(f, "GHS"),
            Self::Kes => write!(f, "KES"),
            Self::Zar => write!(f, "ZAR"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NGN" => Ok(Self::Ngn),
            "USD" => Ok(Self::Usd),
            "GHS" => Ok(Self::Ghs),
            "KES" => Ok(Self::Kes),
            "ZAR" => Ok(Self::Zar),
            _ => Err(format!("Unknown currency: {s}")),
        }
    }
}

/// A monetary amount in integer minor units with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount in the smallest currency unit (e.g., kobo).
    pub minor_units: i64,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

impl Money {
    /// Creates a new Money instance from validated minor units.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::NotPositive` if `minor_units` is not positive.
    pub fn new(minor_units: i64, currency: Currency) -> Result<Self, MoneyError> {
        if !is_valid_amount(minor_units) {
            return Err(MoneyError::NotPositive(Decimal::from(minor_units)));
        }
        Ok(Self {
            minor_units,
            currency,
        })
    }

    /// Creates a Money instance from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount fails minor-unit conversion.
    pub fn from_decimal(amount: Decimal, currency: Currency) -> Result<Self, MoneyError> {
        Ok(Self {
            minor_units: to_minor_units(amount)?,
            currency,
        })
    }

    /// Returns the decimal representation for display.
    #[must_use]
    pub fn to_decimal(&self) -> Decimal {
        from_minor_units(self.minor_units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(100.00), 10_000)]
    #[case(dec!(500.00), 50_000)]
    #[case(dec!(0.01), 1)]
    #[case(dec!(1), 100)]
    #[case(dec!(19.99), 1_999)]
    #[case(dec!(2.345), 235)] // midpoint rounds away from zero
    #[case(dec!(2.344), 234)]
    fn test_to_minor_units(#[case] amount: Decimal, #[case] expected: i64) {
        assert_eq!(to_minor_units(amount).unwrap(), expected);
    }

    #[rstest]
    #[case(dec!(-5))]
    #[case(dec!(0))]
    #[case(dec!(-0.01))]
    fn test_to_minor_units_rejects_non_positive(#[case] amount: Decimal) {
        assert_eq!(to_minor_units(amount), Err(MoneyError::NotPositive(amount)));
    }

    #[test]
    fn test_to_minor_units_rejects_sub_minor_zero() {
        // 0.001 scales to 0.1 minor units and rounds to 0.
        let amount = dec!(0.001);
        assert_eq!(to_minor_units(amount), Err(MoneyError::NotPositive(amount)));
    }

    #[test]
    fn test_is_valid_amount() {
        assert!(!is_valid_amount(0));
        assert!(is_valid_amount(1));
        assert!(is_valid_amount(50_000));
        assert!(!is_valid_amount(-1));
    }

    #[test]
    fn test_from_minor_units_roundtrip() {
        assert_eq!(from_minor_units(10_000), dec!(100.00));
        assert_eq!(from_minor_units(1), dec!(0.01));
        let minor = to_minor_units(dec!(123.45)).unwrap();
        assert_eq!(from_minor_units(minor), dec!(123.45));
    }

    #[test]
    fn test_money_new_rejects_invalid() {
        assert!(Money::new(0, Currency::Ngn).is_err());
        assert!(Money::new(-50, Currency::Ngn).is_err());
        let money = Money::new(50_000, Currency::Ngn).unwrap();
        assert_eq!(money.minor_units, 50_000);
        assert_eq!(money.to_decimal(), dec!(500.00));
    }

    #[test]
    fn test_money_from_decimal() {
        let money = Money::from_decimal(dec!(500.00), Currency::Ngn).unwrap();
        assert_eq!(money.minor_units, 50_000);
        assert_eq!(money.currency, Currency::Ngn);
    }

    #[test]
    fn test_currency_display_and_parse() {
        use std::str::FromStr;
        assert_eq!(Currency::Ngn.to_string(), "NGN");
        assert_eq!(Currency::from_str("ngn").unwrap(), Currency::Ngn);
        assert_eq!(Currency::from_str("USD").unwrap(), Currency::Usd);
        assert!(Currency::from_str("XXX").is_err());
    }

    #[test]
    fn test_money_error_maps_to_app_error() {
        let err: crate::error::AppError = MoneyError::NotPositive(dec!(-5)).into();
        assert_eq!(err.error_code(), "INVALID_AMOUNT");
    }
}
