//! # Money Module
//!
//! Provides the `Money` type for every price, cost and revenue figure in the
//! back-office.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Summing order totals as floats:                                        │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │                                                                         │
//! │  A month of revenue drifts by fractions of a cent per order, and the   │
//! │  monthly buckets no longer add up to the period total.                  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every amount is an i64 count of cents. Sums are exact, so            │
//! │    Σ revenue_by_month == total_revenue holds to the cent.               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tienda_core::money::Money;
//! use tienda_core::types::Rate;
//!
//! let unit_price = Money::from_cents(50_000); // $500.00
//! let revenue = unit_price * 2;              // $1000.00
//!
//! // Cost derived from a 40% margin
//! let cost = revenue.after_margin(Rate::from_percentage(40.0));
//! assert_eq!(cost.cents(), 60_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::Rate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: gross profit can be negative when costs exceed revenue
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Serialized as cents**: the HTTP layer formats for display
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use tienda_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units (dollars and cents).
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -$5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Zero money value.
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

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies a unit amount by a quantity, saturating at the i64 bounds.
    ///
    /// ```rust
    /// use tienda_core::money::Money;
    ///
    /// let line = Money::from_cents(30_000).multiply_quantity(2);
    /// assert_eq!(line.cents(), 60_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Multiplies a unit amount by a quantity, `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Returns `rate` percent of this amount, rounded half away from zero.
    ///
    /// ## Implementation
    /// Integer math in i128: `amount * bps / 10000`, so a margin of
    /// 33.33% on $10.00 is exactly 333 cents, never 333.29999.
    pub fn percentage(&self, rate: Rate) -> Money {
        Money::from_cents(div_round(self.0 as i128 * rate.bps() as i128, 10_000) as i64)
    }

    /// Returns what remains after taking `margin` off this amount.
    ///
    /// This is the margin-based cost formula: `cost = revenue × (1 − margin)`.
    ///
    /// ```rust
    /// use tienda_core::money::Money;
    /// use tienda_core::types::Rate;
    ///
    /// let revenue = Money::from_cents(100_000);
    /// let cost = revenue.after_margin(Rate::from_bps(2_500)); // 25%
    /// assert_eq!(cost.cents(), 75_000);
    /// ```
    pub fn after_margin(&self, margin: Rate) -> Money {
        *self - self.percentage(margin)
    }

    /// Divides into `parts`, rounding half away from zero.
    ///
    /// Returns zero for zero parts (an empty period has no average).
    pub fn divide_rounded(&self, parts: i64) -> Money {
        if parts == 0 {
            return Money::zero();
        }
        Money::from_cents(div_round(self.0 as i128, parts as i128) as i64)
    }

    /// Expresses this amount as a percentage of `whole`.
    ///
    /// Returns 0.0 when `whole` is zero. Display only, never fed back into
    /// money arithmetic.
    pub fn percent_of(&self, whole: Money) -> f64 {
        if whole.is_zero() {
            return 0.0;
        }
        self.0 as f64 / whole.0 as f64 * 100.0
    }
}

/// Integer division rounding half away from zero.
fn div_round(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator.abs() {
        if (numerator < 0) != (denominator < 0) {
            quotient - 1
        } else {
            quotient + 1
        }
    } else {
        quotient
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented display. The dashboard formats amounts itself.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
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
        self.multiply_quantity(qty)
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
