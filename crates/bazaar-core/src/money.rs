//! # Money Module
//!
//! Provides the `Money` type for every monetary value in Bazaar.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE RECONCILIATION PROBLEM                                             │
//! │                                                                         │
//! │  A cart total is subtotal + tax + delivery + commission.                │
//! │  With floating point each part carries its own error, and the          │
//! │  parts no longer add up to the stored total.                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Each line amount is rounded once, in cents.                          │
//! │    Aggregates are exact integer sums, so the identity always holds.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bazaar_core::money::Money;
//! use bazaar_core::types::Rate;
//!
//! let dish = Money::from_major(10);          // 10.00
//! let line = dish.checked_mul(2).unwrap();   // 20.00
//! let tax = line.percentage(Rate::from_bps(500)); // 5% of 20.00
//! assert_eq!(tax.cents(), 100);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

use crate::types::Rate;

/// A monetary value in the smallest currency unit (cents).
///
/// Signed so that refunds and corrections can be represented, although the
/// pricing engine itself only ever produces non-negative amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole currency units.
    ///
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(15).cents(), 1500);
    /// ```
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is strictly greater than zero.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies money by a quantity (units, nights, ...). `None` on
    /// overflow.
    ///
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// let nightly = Money::from_cents(8_000);
    /// assert_eq!(nightly.checked_mul(3), Some(Money::from_cents(24_000)));
    /// assert_eq!(nightly.checked_mul(i64::MAX), None);
    /// ```
    #[inline]
    pub const fn checked_mul(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts. `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Sums amounts. `None` if any partial sum overflows.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Applies a percentage rate and returns the resulting amount.
    ///
    /// Used for both tax and commission. Rounds half up to the nearest cent:
    /// `(amount_cents * bps + 5000) / 10000`, computed in i128 so large
    /// amounts cannot overflow.
    ///
    /// ```rust
    /// use bazaar_core::money::Money;
    /// use bazaar_core::types::Rate;
    ///
    /// // 10.00 at 8.25% = 0.825 → 0.83
    /// let tax = Money::from_cents(1000).percentage(Rate::from_bps(825));
    /// assert_eq!(tax.cents(), 83);
    /// ```
    pub fn percentage(&self, rate: Rate) -> Money {
        let amount = (i128::from(self.0) * i128::from(rate.bps()) + 5000) / 10000;
        Money(amount as i64)
    }
}

/// Renders as a plain decimal amount ("10.99"). Currency formatting is a
/// presentation concern and lives outside the engine.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major() {
        assert_eq!(Money::from_major(10).cents(), 1000);
        assert_eq!(Money::from_major(0), Money::zero());
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
    }

    #[test]
    fn test_percentage_exact() {
        // 20.00 at 5% = 1.00
        let tax = Money::from_major(20).percentage(Rate::from_bps(500));
        assert_eq!(tax, Money::from_major(1));

        // 20.00 at 10% = 2.00
        let commission = Money::from_major(20).percentage(Rate::from_bps(1000));
        assert_eq!(commission, Money::from_major(2));
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // 0.05 at 50% = 0.025 → 0.03
        assert_eq!(Money::from_cents(5).percentage(Rate::from_bps(5000)).cents(), 3);
        // 0.01 at 10% = 0.001 → 0.00
        assert_eq!(Money::from_cents(1).percentage(Rate::from_bps(1000)).cents(), 0);
    }

    #[test]
    fn test_percentage_zero_rate() {
        assert!(Money::from_major(99).percentage(Rate::zero()).is_zero());
    }

    #[test]
    fn test_sum() {
        let parts = [Money::from_cents(100), Money::from_cents(250), Money::from_cents(5)];
        let total: Money = parts.iter().sum();
        assert_eq!(total.cents(), 355);
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        let huge = Money::from_cents(i64::MAX / 2 + 1);

        assert_eq!(huge.checked_mul(2), None);
        assert_eq!(huge.checked_add(huge), None);
        assert_eq!(Money::checked_sum([huge, huge]), None);
        assert_eq!(
            Money::checked_sum([Money::from_cents(100), Money::from_cents(5)]),
            Some(Money::from_cents(105))
        );
    }

    #[test]
    fn test_serializes_as_plain_cents() {
        let json = serde_json::to_string(&Money::from_cents(2400)).unwrap();
        assert_eq!(json, "2400");
    }
}
