//! Decimal money amounts.
//!
//! The storefront trades in a single currency, so a `Money` is just a
//! decimal amount in the currency's standard unit (e.g. dollars, not cents).
//! Arithmetic stays in `Decimal` so cart totals never pick up float noise.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Sub};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount from a decimal value.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create an amount from a count of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Clamp negative amounts to zero.
    ///
    /// A wallet balance is never observed below zero, whatever the backend
    /// reports.
    #[must_use]
    pub fn non_negative(self) -> Self {
        if self.is_negative() { Self::ZERO } else { self }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0.round_dp(2))
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Self> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl core::str::FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('$').parse::<Decimal>().map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_two_places() {
        assert_eq!(Money::from_cents(5500).to_string(), "$55.00");
        assert_eq!(Money::from_cents(1).to_string(), "$0.01");
    }

    #[test]
    fn test_sum_is_exact() {
        let total: Money = [Money::from_cents(10), Money::from_cents(20)].iter().sum();
        assert_eq!(total, Money::from_cents(30));
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(Money::from_cents(-100).non_negative(), Money::ZERO);
        assert_eq!(Money::from_cents(100).non_negative(), Money::from_cents(100));
    }

    #[test]
    fn test_parse() {
        assert_eq!("$12.50".parse::<Money>().unwrap(), Money::from_cents(1250));
        assert_eq!(" 3 ".parse::<Money>().unwrap(), Money::from_cents(300));
        assert!("abc".parse::<Money>().is_err());
    }
}
