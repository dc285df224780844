use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Number of fractional digits every balance and amount is kept at.
pub const SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("`{0}` is not a decimal number")]
    Malformed(String),
    #[error("Amount {0} has more than 2 decimal places")]
    TooPrecise(Decimal),
    #[error("Amount must be positive, got {0}")]
    NotPositive(Decimal),
    #[error("Amount must not be negative, got {0}")]
    Negative(Decimal),
    #[error("Amount {0} is out of the storable range")]
    OutOfRange(Decimal),
}

/// Non-negative monetary value with a fixed scale of two decimal places.
///
/// Balances are compared, added and subtracted as [`Decimal`], and persisted as
/// an integer count of minor units, so no binary floating point is involved at
/// any stage. Every value fits into an `i64` count of minor units, whichever
/// store holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn zero() -> Self {
        Self(Decimal::new(0, SCALE))
    }

    /// Accepts zero and positive values with at most [`SCALE`] fractional digits.
    /// Extra precision is an error, never rounded away.
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value < Decimal::ZERO {
            return Err(MoneyError::Negative(value));
        }
        let mut scaled = value.normalize();
        if scaled.scale() > SCALE {
            return Err(MoneyError::TooPrecise(value));
        }
        scaled.rescale(SCALE);
        Self::in_range(scaled).ok_or(MoneyError::OutOfRange(value))
    }

    /// Like [`Money::new`], but also rejects zero. Used for mutation amounts.
    pub fn positive(value: Decimal) -> Result<Self, MoneyError> {
        if value <= Decimal::ZERO {
            return Err(MoneyError::NotPositive(value));
        }
        Self::new(value)
    }

    pub fn from_minor_units(units: i64) -> Result<Self, MoneyError> {
        let value = Decimal::new(units, SCALE);
        if units < 0 {
            return Err(MoneyError::Negative(value));
        }
        Ok(Self(value))
    }

    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        i64::try_from(self.0.mantissa()).map_err(|_| MoneyError::OutOfRange(self.0))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `None` when the sum leaves the minor-unit range. `Decimal`
    /// would otherwise round a too-large sum down to a smaller scale.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).and_then(Self::in_range)
    }

    /// Returns `None` when the result would drop below zero.
    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        if other.0 > self.0 {
            return None;
        }
        self.0.checked_sub(other.0).map(Self)
    }

    fn in_range(value: Decimal) -> Option<Money> {
        let fits = value.scale() == SCALE && i64::try_from(value.mantissa()).is_ok();
        fits.then_some(Self(value))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|_| MoneyError::Malformed(s.to_string()))?;
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::prelude::FromPrimitive;

    use super::*;

    #[test]
    fn keeps_two_decimal_places() {
        let money = Money::new(Decimal::from_u32(70).unwrap()).unwrap();
        assert_eq!(money.to_string(), "70.00");
        assert_eq!("2.5".parse::<Money>().unwrap().to_string(), "2.50");
        // trailing zeros beyond the scale are not extra precision
        assert_eq!("1.2300".parse::<Money>().unwrap().to_string(), "1.23");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            "0.005".parse::<Money>(),
            Err(MoneyError::TooPrecise(_))
        ));
        assert!(matches!("-1".parse::<Money>(), Err(MoneyError::Negative(_))));
        assert!(matches!("ten".parse::<Money>(), Err(MoneyError::Malformed(_))));
        assert!(matches!(
            Money::positive(Decimal::ZERO),
            Err(MoneyError::NotPositive(_))
        ));
        assert!(matches!(
            Money::positive(Decimal::from_i32(-5).unwrap()),
            Err(MoneyError::NotPositive(_))
        ));
        assert!(Money::new(Decimal::ZERO).unwrap().is_zero());
    }

    #[test]
    fn minor_units_are_exact() {
        let money: Money = "1234.56".parse().unwrap();
        assert_eq!(money.to_minor_units().unwrap(), 123_456);
        assert_eq!(Money::from_minor_units(123_456).unwrap(), money);
        assert_eq!(Money::from_minor_units(7).unwrap().to_string(), "0.07");
        assert!(matches!(
            Money::from_minor_units(-1),
            Err(MoneyError::Negative(_))
        ));

        let max = Money::from_minor_units(i64::MAX).unwrap();
        assert_eq!(max.to_minor_units().unwrap(), i64::MAX);
        assert_eq!(max.to_string(), "92233720368547758.07");
    }

    #[test]
    fn rejects_values_beyond_minor_unit_range() {
        assert!(matches!(
            "92233720368547758.08".parse::<Money>(),
            Err(MoneyError::OutOfRange(_))
        ));
        assert!(matches!(
            Money::new(Decimal::from_i128_with_scale(i128::from(i64::MAX), 0)),
            Err(MoneyError::OutOfRange(_))
        ));
        assert!(matches!(
            "500000000000000000000000000.01".parse::<Money>(),
            Err(MoneyError::OutOfRange(_))
        ));
    }

    #[test]
    fn many_small_deposits_do_not_drift() {
        let cent: Money = "0.01".parse().unwrap();
        let mut total = Money::zero();
        for _ in 0..10_000 {
            total = total.checked_add(cent).unwrap();
        }
        assert_eq!(total, "100".parse().unwrap());
    }

    #[test]
    fn sum_past_range_is_refused_not_rounded() {
        let half: Money = "50000000000000000.01".parse().unwrap();
        let total = half.checked_add(half);
        assert_eq!(total, None);

        let max = Money::from_minor_units(i64::MAX).unwrap();
        let cent: Money = "0.01".parse().unwrap();
        assert_eq!(max.checked_add(cent), None);
        assert_eq!(
            max.checked_sub(cent).unwrap().checked_add(cent),
            Some(max)
        );
    }

    #[test]
    fn checked_sub_never_goes_negative() {
        let seventy: Money = "70".parse().unwrap();
        let thirty: Money = "30".parse().unwrap();
        assert_eq!(seventy.checked_sub(thirty), Some("40".parse().unwrap()));
        assert_eq!(thirty.checked_sub(seventy), None);
        assert_eq!(seventy.checked_sub(seventy), Some(Money::zero()));
    }
}
