//! Fixed-point money.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A monetary amount backed by an exact decimal.
///
/// Equality is exact and scale-insensitive: `12.0` equals `12.00`, while
/// `12.00` never equals `12.001`. Arithmetic never rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

/// Returned when a string cannot be parsed as a decimal amount.
#[derive(Debug, Clone, Error)]
#[error("invalid amount '{0}'")]
pub struct InvalidMoney(pub String);

impl Money {
    /// The smallest amount a caller may pay or refund.
    pub const MIN_CHARGE: Money = Money(Decimal::from_parts(1, 0, 0, false, 2));

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Creates an amount from an integer number of cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Wraps an existing decimal.
    pub fn from_decimal(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the underlying decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Multiplies by a line quantity.
    ///
    /// Panics on decimal overflow; use [`Money::checked_times`] on amounts
    /// that have not been validated.
    pub fn times(&self, quantity: u32) -> Money {
        Money(self.0 * Decimal::from(quantity))
    }

    /// Multiplies by a line quantity, or `None` on overflow.
    pub fn checked_times(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(Decimal::from(quantity)).map(Money)
    }

    /// Adds two amounts, or `None` on overflow.
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }
}

impl FromStr for Money {
    type Err = InvalidMoney;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Money)
            .map_err(|_| InvalidMoney(s.to_string()))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn equality_ignores_scale() {
        assert_eq!(money("12.0"), money("12.00"));
        assert_eq!(money("12"), Money::from_cents(1200));
    }

    #[test]
    fn equality_is_exact() {
        assert_ne!(money("12.00"), money("12.001"));
        assert_ne!(money("11.99"), money("12.00"));
    }

    #[test]
    fn line_extension_sums_without_rounding() {
        let total: Money = [money("3.50").times(2), money("1.25").times(4)]
            .into_iter()
            .sum();
        assert_eq!(total, money("12.00"));
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let huge = Money::from_decimal(Decimal::MAX);
        assert_eq!(huge.checked_times(2), None);
        assert_eq!(huge.checked_add(money("0.01")), None);
        assert_eq!(huge.checked_times(1), Some(huge));
        assert_eq!(money("3.50").checked_times(2), Some(money("7.00")));
        assert_eq!(money("7.00").checked_add(money("5")), Some(money("12.00")));
    }

    #[test]
    fn min_charge_is_one_cent() {
        assert_eq!(Money::MIN_CHARGE, money("0.01"));
        assert!(money("0.009") < Money::MIN_CHARGE);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("twelve".parse::<Money>().is_err());
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_string(&money("12.50")).unwrap();
        assert_eq!(json, "\"12.50\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, money("12.5"));
    }
}
