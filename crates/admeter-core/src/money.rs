//! Fixed-point money
//!
//! Every cost and spend accumulator is a [`Money`]. Arithmetic stays in
//! decimal end-to-end; conversion to `f64` happens only when rendering JSON.
//! There is no `+` operator: accumulators use [`Money::checked_add`] and
//! read-side rollups use [`Money::saturating_add`].

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

/// Fixed-point monetary amount
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    /// Zero amount
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Wrap a decimal
    #[inline]
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build from a float, keeping the shortest decimal representation
    #[must_use]
    pub fn from_f64(value: f64) -> Option<Self> {
        Decimal::from_f64(value).map(|d| Self(d.normalize()))
    }

    /// Underlying decimal
    #[inline]
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Strictly greater than zero
    #[inline]
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Lossy float view for JSON and scoring
    #[inline]
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or_default()
    }

    /// `self + rhs`, `None` on overflow
    #[inline]
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// `self + rhs`, clamped to the representable range
    #[inline]
    #[must_use]
    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// `self * count`, `None` on overflow
    #[inline]
    #[must_use]
    pub fn checked_times(self, count: u64) -> Option<Self> {
        self.0.checked_mul(Decimal::from(count)).map(Self)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Money::saturating_add)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s).map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Money::from_f64(value)
            .ok_or_else(|| de::Error::custom(format!("{value} is not a representable amount")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulating_tenths_does_not_drift() {
        let tenth = Money::from_str("0.1").unwrap();
        let total: Money = std::iter::repeat(tenth).take(100).sum();
        assert_eq!(total, Money::from_str("10").unwrap());
        assert_eq!(tenth.checked_times(100), Some(total));
    }

    #[test]
    fn overflow_is_reported_not_panicked() {
        let huge = Money::new(Decimal::MAX);
        let one = Money::from_str("1").unwrap();

        assert_eq!(huge.checked_add(one), None);
        assert_eq!(huge.saturating_add(one), huge);
        assert_eq!(huge.checked_times(2), None);
        assert_eq!([huge, huge].into_iter().sum::<Money>(), huge);
        assert_eq!(one.checked_add(one), Some(Money::from_str("2").unwrap()));
    }

    #[test]
    fn json_renders_as_number() {
        let amount = Money::from_str("12.5").unwrap();
        assert_eq!(serde_json::to_string(&amount).unwrap(), "12.5");

        let parsed: Money = serde_json::from_str("0.3").unwrap();
        assert_eq!(parsed, Money::from_str("0.3").unwrap());
    }

    #[test]
    fn positivity() {
        assert!(!Money::ZERO.is_positive());
        assert!(Money::from_str("0.01").unwrap().is_positive());
        assert!(!Money::from_str("-1").unwrap().is_positive());
    }
}
