//! # Money Module
//!
//! Provides the `Money` type for monetary values in minor units (cents).
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE SIGNED STRING PROBLEM                                              │
//! │                                                                         │
//! │  Canonical strings carry amounts as integer cents:                      │
//! │    115.00 USD  ──►  "11500"                                             │
//! │                                                                         │
//! │  With floats:  round(0.1 + 0.2, 2) * 100 = 30.000000000000004           │
//! │    → one stray digit and the authority rejects the signature            │
//! │                                                                         │
//! │  OUR SOLUTION: parse decimal text straight into i64 cents               │
//! │    "0.30" ──► 30     "-50" ──► -5000     "1.005" ──► 101 (half away)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use fiscal_core::money::Money;
//! use fiscal_core::types::TaxRate;
//!
//! let line_total = Money::parse("100").unwrap();
//! assert_eq!(line_total.cents(), 10000);
//!
//! let tax = line_total.tax_at(TaxRate::from_bps(1500));
//! assert_eq!(tax.cents(), 1500);
//! ```

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::error::ValidationError;
use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Signed: credit notes carry negative line totals and flow into negative
/// counters and negative canonical-string amounts unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
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

    /// Parses a decimal amount ("100", "99.5", "-12.345") into cents.
    ///
    /// More than two fractional digits round half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use fiscal_core::money::Money;
    ///
    /// assert_eq!(Money::parse("10.99").unwrap().cents(), 1099);
    /// assert_eq!(Money::parse("-0.005").unwrap().cents(), -1);
    /// assert!(Money::parse("ten").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Money, ValidationError> {
        parse_scaled(input, 2)
            .map(Money)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "amount".to_string(),
                reason: format!("'{}' is not a decimal amount", input.trim()),
            })
    }

    /// Tax on this amount at `rate`, rounded half away from zero.
    ///
    /// ```text
    /// 100.00 × 15%   = 15.00      →  1500
    /// 0.05   × 15%   = 0.0075     →  1
    /// -0.05  × 15%   = -0.0075    →  -1
    /// ```
    pub fn tax_at(&self, rate: TaxRate) -> Money {
        // i128: cents × bps overflows i64 for very large amounts
        let product = self.0 as i128 * rate.bps() as i128;
        let rounded = (product.abs() + 5000) / 10000;
        let signed = if product < 0 { -rounded } else { rounded };
        Money(signed as i64)
    }
}

// =============================================================================
// Decimal Parsing
// =============================================================================

/// Parses decimal text into an integer scaled by `10^scale`.
///
/// Accepts an optional sign, digits, and an optional fraction. Digits
/// beyond `scale` round half away from zero. Exponents are rejected.
pub(crate) fn parse_scaled(input: &str, scale: u32) -> Option<i64> {
    let s = input.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut value: i64 = 0;
    for b in int_part.bytes() {
        value = value.checked_mul(10)?.checked_add(i64::from(b - b'0'))?;
    }

    let mut frac = frac_part.bytes();
    for _ in 0..scale {
        let digit = frac.next().map_or(0, |b| b - b'0');
        value = value.checked_mul(10)?.checked_add(i64::from(digit))?;
    }
    if frac.next().is_some_and(|b| b >= b'5') {
        value = value.checked_add(1)?;
    }

    Some(if negative { -value } else { value })
}

/// Formats a scaled integer as decimal text with exactly `scale` digits.
pub(crate) fn format_scaled(value: i64, scale: u32) -> String {
    let divisor = 10_i64.pow(scale);
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / divisor as u64,
        abs % divisor as u64,
        width = scale as usize
    )
}

/// Serde visitor that accepts JSON numbers or decimal strings.
///
/// Floats are rendered with Rust's shortest round-trip formatting before
/// parsing, so `99.99` arrives as the text "99.99" rather than
/// 99.98999999999999.
pub(crate) struct ScaledVisitor {
    pub scale: u32,
    pub what: &'static str,
}

impl<'de> Visitor<'de> for ScaledVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a decimal {} as a number or string", self.what)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
        v.checked_mul(10_i64.pow(self.scale))
            .ok_or_else(|| E::custom(format!("{} out of range", self.what)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
        i64::try_from(v)
            .ok()
            .and_then(|v| v.checked_mul(10_i64.pow(self.scale)))
            .ok_or_else(|| E::custom(format!("{} out of range", self.what)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
        if !v.is_finite() {
            return Err(E::custom(format!("{} must be finite", self.what)));
        }
        self.visit_str(&v.to_string())
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
        parse_scaled(v, self.scale)
            .ok_or_else(|| E::custom(format!("'{}' is not a valid {}", v, self.what)))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Renders "10.99" / "-5.50". Currency codes travel separately.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_scaled(self.0, 2))
    }
}

/// JSON documents carry amounts as decimal numbers (11500 → 115.0).
impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / 100.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_any(ScaledVisitor {
                scale: 2,
                what: "amount",
            })
            .map(Money)
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

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
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
