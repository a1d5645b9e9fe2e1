//! # Money Module
//!
//! Provides the `Money` type for prices, line totals and discounts.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cart totals are sums of unit price × quantity, minus a discount.       │
//! │                                                                         │
//! │  As floats:   0.10 + 0.20            = 0.30000000000000004              │
//! │  As paise:    10 + 20                = 30                               │
//! │                                                                         │
//! │  Every amount is the smallest currency unit in an i64. Only display    │
//! │  code converts to a decimal string.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mart_core::money::Money;
//!
//! let price = Money::from_cents(4599);
//! let line = price * 3;
//! assert_eq!(line.cents(), 13797);
//! assert_eq!("45.99".parse::<Money>().unwrap(), price);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Signed so that intermediate results (subtotal − discount) can be
/// inspected before clamping.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from the smallest currency unit.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ```rust
    /// use mart_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in the smallest currency unit.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero.
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

    /// Unit price × quantity, saturating at the i64 bounds.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Restricts the value to `[min, max]`.
    ///
    /// If `max < min` (e.g. an empty cart's subtotal below a zero floor), the
    /// floor wins.
    pub fn clamp_to(self, min: Money, max: Money) -> Money {
        if max < min {
            return min;
        }
        Money(self.0.clamp(min.0, max.0))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering (`"12.34"`, `"-0.50"`); currency symbols are a
/// display concern of the caller.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        f.pad(&format!("{}{}.{:02}", sign, abs / 100, abs % 100))
    }
}

/// Parses a decimal amount with at most two fractional digits.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (major, minor) = match digits.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (digits, ""),
        };

        if major.is_empty() && minor.is_empty() {
            return Err(invalid("expected a number"));
        }
        if !major.chars().all(|c| c.is_ascii_digit()) || !minor.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("expected digits"));
        }
        if minor.len() > 2 {
            return Err(invalid("at most two decimal places"));
        }

        let major: i64 = if major.is_empty() {
            0
        } else {
            major.parse().map_err(|_| invalid("amount too large"))?
        };
        let minor: i64 = match minor.len() {
            0 => 0,
            1 => minor.parse::<i64>().map_err(|_| invalid("expected digits"))? * 10,
            _ => minor.parse().map_err(|_| invalid("expected digits"))?,
        };

        let cents = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(|| invalid("amount too large"))?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
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

// =============================================================================
// Unit Tests
// =============================================================================
