//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Integer Minor Units
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Rp 73.000,00  ──►  Money(7_300_000)   (two implied decimals)          │
//! │                                                                         │
//! │  Every amount in the engine (prices, tax, tender, change, refunds)     │
//! │  is an i64 count of minor units. "Round to 2 decimal places" means     │
//! │  "round to a whole minor unit", always half-up.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use harbor_core::money::Money;
//!
//! let price = Money::from_major(10_000);
//! let line = price.multiply_quantity(2);
//! assert_eq!(line, Money::from_major(20_000));
//! assert_eq!(line.cents(), 2_000_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

/// Minor units per major unit.
pub const MINOR_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in minor currency units.
///
/// Signed so that differences (shortfall, refunds) can be expressed, but
/// persisted amounts are validated to be non-negative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ```rust
    /// use harbor_core::money::Money;
    ///
    /// let fee = Money::from_cents(1099);
    /// assert_eq!(fee.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole major units.
    ///
    /// ```rust
    /// use harbor_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(73_000).cents(), 7_300_000);
    /// ```
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * MINOR_PER_MAJOR)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole major-unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Returns the minor-unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// ```rust
    /// use harbor_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Like [`Money::multiply_quantity`], but `None` on overflow.
    #[inline]
    pub const fn checked_mul_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(value) => Some(Money(value)),
            None => None,
        }
    }

    /// Addition that returns `None` on overflow.
    ///
    /// ```rust
    /// use harbor_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1).checked_add(Money::from_cents(2)), Some(Money::from_cents(3)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
    /// ```
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Sums amounts, `None` if the total does not fit.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |total, amount| total.checked_add(amount))
    }

    /// Applies a basis-point rate, rounding half-up to a whole minor unit.
    ///
    /// ## Implementation
    /// `round(amount × bps / 10000)` computed in i128 so large order totals
    /// cannot overflow.
    ///
    /// ```rust
    /// use harbor_core::money::Money;
    /// use harbor_core::types::TaxRate;
    ///
    /// let amount = Money::from_cents(1000);
    /// // 1000 × 8.25% = 82.5 → 83
    /// assert_eq!(amount.apply_rate(TaxRate::from_bps(825)).cents(), 83);
    /// ```
    pub fn apply_rate(&self, rate: TaxRate) -> Money {
        let value = div_round_half_up(
            self.0 as i128 * rate.bps() as i128,
            TaxRate::BPS_SCALE as i128,
        );
        Money(value as i64)
    }

    /// Returns `self × numerator / denominator`, rounded half-up.
    ///
    /// Used for proportional allocation (line tax by line-total share).
    /// A zero denominator yields zero.
    ///
    /// ```rust
    /// use harbor_core::money::Money;
    ///
    /// let total_tax = Money::from_cents(1100);
    /// let share = total_tax.proportion(Money::from_cents(2000), Money::from_cents(3000));
    /// assert_eq!(share.cents(), 733);
    /// ```
    pub fn proportion(&self, numerator: Money, denominator: Money) -> Money {
        if denominator.is_zero() {
            return Money::zero();
        }
        let value = div_round_half_up(
            self.0 as i128 * numerator.0 as i128,
            denominator.0 as i128,
        );
        Money(value as i64)
    }

    /// Subtraction that fails instead of going negative.
    ///
    /// ```rust
    /// use harbor_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(500).checked_sub_non_negative(Money::from_cents(200)), Some(Money::from_cents(300)));
    /// assert_eq!(Money::from_cents(100).checked_sub_non_negative(Money::from_cents(200)), None);
    /// ```
    pub fn checked_sub_non_negative(&self, other: Money) -> Option<Money> {
        let result = self.0.checked_sub(other.0)?;
        (result >= 0).then_some(Money(result))
    }
}

/// Integer division rounding half away from zero.
///
/// For non-negative inputs this is plain half-up rounding.
pub(crate) fn div_round_half_up(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator != 0);
    let (numerator, denominator) = if denominator < 0 {
        (-numerator, -denominator)
    } else {
        (numerator, denominator)
    };
    if numerator >= 0 {
        (2 * numerator + denominator) / (2 * denominator)
    } else {
        -((-2 * numerator + denominator) / (2 * denominator))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering with two places, e.g. `73000.00`.
///
/// Currency symbols and grouping belong to the receipt renderer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
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

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
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

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major_and_parts() {
        let money = Money::from_cents(1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor_part(), 99);
        assert_eq!(Money::from_major(5).cents(), 500);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_major(73_000).to_string(), "73000.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);
        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_apply_rate_rounds_half_up() {
        // 100000.00 at 11% = 11000.00
        let amount = Money::from_major(100_000);
        assert_eq!(amount.apply_rate(TaxRate::from_bps(1100)), Money::from_major(11_000));

        // 0.50 at 1% = 0.005 → 0.01
        assert_eq!(Money::from_cents(50).apply_rate(TaxRate::from_bps(100)).cents(), 1);
        // 0.49 at 1% = 0.0049 → 0.00
        assert_eq!(Money::from_cents(49).apply_rate(TaxRate::from_bps(100)).cents(), 0);
    }

    #[test]
    fn test_proportion_zero_denominator() {
        let tax = Money::from_cents(500);
        assert_eq!(tax.proportion(Money::from_cents(10), Money::zero()), Money::zero());
    }

    #[test]
    fn test_div_round_half_up_negative() {
        assert_eq!(div_round_half_up(5, 2), 3);
        assert_eq!(div_round_half_up(-5, 2), -3);
        assert_eq!(div_round_half_up(4, 3), 1);
        assert_eq!(div_round_half_up(5, -2), -3);
    }

    #[test]
    fn test_checked_arithmetic() {
        let big = Money::from_cents(i64::MAX / 2);
        assert_eq!(big.checked_mul_quantity(3), None);
        assert_eq!(Money::from_cents(299).checked_mul_quantity(3), Some(Money::from_cents(897)));
        assert_eq!(Money::checked_sum([big, big, Money::from_cents(2)]), None);
        assert_eq!(
            Money::checked_sum([Money::from_cents(1), Money::from_cents(2)]),
            Some(Money::from_cents(3))
        );
        assert_eq!(Money::checked_sum(std::iter::empty()), Some(Money::zero()));
    }

    #[test]
    fn test_serializes_as_plain_number() {
        let json = serde_json::to_string(&Money::from_cents(2_500_000)).unwrap();
        assert_eq!(json, "2500000");
    }
}
