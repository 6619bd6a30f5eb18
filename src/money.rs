//! Money helpers
//!
//! All monetary amounts are `rust_decimal::Decimal`. Every rounding to a
//! currency's minor unit MUST go through this module so the whole crate
//! agrees on one rounding rule: round-half-up (midpoint away from zero).
//!
//! No silent truncation: amount validation returns explicit errors.

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Money validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount has more than {max} decimal places")]
    PrecisionOverflow { max: u32 },
}

/// Round to the currency's minor unit using round-half-up.
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use sokoni::money::round_minor;
/// assert_eq!(round_minor(Decimal::new(2125, 3), 2), Decimal::new(213, 2)); // 2.125 -> 2.13
/// ```
#[inline]
pub fn round_minor(amount: Decimal, minor_units: u32) -> Decimal {
    amount.round_dp_with_strategy(minor_units, RoundingStrategy::MidpointAwayFromZero)
}

/// Validate an amount that must be strictly positive and representable in the
/// currency's minor unit.
pub fn check_positive(amount: Decimal, minor_units: u32) -> Result<Decimal, MoneyError> {
    if amount <= Decimal::ZERO {
        return Err(MoneyError::InvalidAmount);
    }
    if amount.scale() > minor_units && round_minor(amount, minor_units) != amount {
        return Err(MoneyError::PrecisionOverflow { max: minor_units });
    }
    Ok(amount.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_minor(dec("3.005"), 2), dec("3.01"));
        assert_eq!(round_minor(dec("3.004"), 2), dec("3.00"));
        assert_eq!(round_minor(dec("3.995"), 2), dec("4.00"));
        // negative amounts round away from zero as well
        assert_eq!(round_minor(dec("-3.005"), 2), dec("-3.01"));
    }

    #[test]
    fn test_round_zero_minor_units() {
        assert_eq!(round_minor(dec("99.5"), 0), dec("100"));
        assert_eq!(round_minor(dec("99.4"), 0), dec("99"));
    }

    #[test]
    fn test_check_positive() {
        assert!(check_positive(dec("10.00"), 2).is_ok());
        assert_eq!(check_positive(dec("0"), 2), Err(MoneyError::InvalidAmount));
        assert_eq!(
            check_positive(dec("-5"), 2),
            Err(MoneyError::InvalidAmount)
        );
        assert_eq!(
            check_positive(dec("1.005"), 2),
            Err(MoneyError::PrecisionOverflow { max: 2 })
        );
        // trailing zeros beyond the minor unit are fine
        assert!(check_positive(dec("1.0000"), 2).is_ok());
    }
}
