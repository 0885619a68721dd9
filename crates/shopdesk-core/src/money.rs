//! # Money Module
//!
//! Integer money, locale-aware formatting and installment plans.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every amount in the data layer is stored in cents (i64).              │
//! │                                                                         │
//! │    Opening balance   15000  ──┐                                         │
//! │    + deposits         2500    ├──► cash in register 14500               │
//! │    - withdrawals      3000  ──┘                                         │
//! │                                                                         │
//! │  The balance invariant is checked with exact equality, which only      │
//! │  works because nothing here is a float.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use shopdesk_core::money::{CurrencyFormat, Money};
//!
//! let price = Money::from_cents(123456);
//! assert_eq!(CurrencyFormat::default().format(price), "$1,234.56");
//!
//! let parts = Money::from_cents(1000).split(3);
//! assert_eq!(parts, vec![Money::from_cents(334), Money::from_cents(333), Money::from_cents(333)]);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::validation::validate_installments;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Serializes as a plain integer so rows at the store boundary stay numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole major units, truncated toward zero.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Minor-unit part, always 0-99.
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
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

    /// `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_sub(&self, other: Money) -> Option<Money> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Adds a surcharge expressed in basis points (250 = 2.5%), rounding
    /// half away from zero.
    ///
    /// ```rust
    /// use shopdesk_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(10000).with_surcharge_bps(299).cents(), 10299);
    /// assert_eq!(Money::from_cents(999).with_surcharge_bps(50).cents(), 1004);
    /// ```
    pub fn with_surcharge_bps(&self, bps: u32) -> Money {
        let extra = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money(self.0 + extra as i64)
    }

    /// Splits the amount into `count` parts that sum back exactly.
    ///
    /// The remainder cents go to the first parts, one each. A count of zero
    /// yields an empty vector.
    pub fn split(&self, count: u32) -> Vec<Money> {
        if count == 0 {
            return Vec::new();
        }
        let n = i64::from(count);
        let base = self.0 / n;
        let remainder = self.0 % n;
        (0..n)
            .map(|i| {
                if i < remainder.abs() {
                    Money(base + remainder.signum())
                } else {
                    Money(base)
                }
            })
            .collect()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented display; UI text goes through [`CurrencyFormat`].
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.major().abs(), self.minor())
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

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
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
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Currency Formatting
// =============================================================================

/// How amounts are rendered for people (receipts, webhook messages).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyFormat {
    pub symbol: String,
    pub decimal_separator: char,
    pub thousands_separator: char,
    /// Put a space between the symbol and the digits ("R$ 10,00").
    pub space_after_symbol: bool,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self {
            symbol: "$".to_string(),
            decimal_separator: '.',
            thousands_separator: ',',
            space_after_symbol: false,
        }
    }
}

impl CurrencyFormat {
    /// Brazilian real formatting: `R$ 1.234,56`.
    pub fn brl() -> Self {
        Self {
            symbol: "R$".to_string(),
            decimal_separator: ',',
            thousands_separator: '.',
            space_after_symbol: true,
        }
    }

    pub fn format(&self, amount: Money) -> String {
        let digits = amount.major().abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(self.thousands_separator);
            }
            grouped.push(c);
        }

        let sign = if amount.is_negative() { "-" } else { "" };
        let space = if self.space_after_symbol { " " } else { "" };
        format!(
            "{sign}{}{space}{grouped}{}{:02}",
            self.symbol,
            self.decimal_separator,
            amount.minor()
        )
    }
}

// =============================================================================
// Installment Plans
// =============================================================================

/// A credit sale split into monthly installments.
///
/// ```text
/// total 100.00, 3x, surcharge 2.99%
///      │
///      ▼
/// financed 102.99 ──► [34.33, 34.33, 34.33]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InstallmentPlan {
    pub count: u32,
    pub financed_total: Money,
    pub installments: Vec<Money>,
}

impl InstallmentPlan {
    /// Builds a plan for `count` installments with the given surcharge.
    ///
    /// Single-installment plans are never surcharged.
    pub fn new(total: Money, count: u32, surcharge_bps: u32) -> CoreResult<Self> {
        validate_installments(count)?;
        if total.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "total".to_string(),
            }
            .into());
        }

        let financed_total = if count == 1 {
            total
        } else {
            total.with_surcharge_bps(surcharge_bps)
        };

        Ok(Self {
            count,
            financed_total,
            installments: financed_total.split(count),
        })
    }

    /// Amount charged on top of the cash price.
    pub fn surcharge(&self, total: Money) -> Money {
        self.financed_total - total
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
