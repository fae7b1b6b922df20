use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "ZAR";
pub const CURRENCY_SYMBOL: &str = "R";

//--------------------------------------       Cents        ---------------------------------------------------------
/// A monetary amount in South African cents. All amounts are stored and compared as whole cents; Rand-denominated
/// strings are only used at the edges of the system (gateway payloads and notification text).
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CentsConversionError(format!("Value {} is too large to convert to Cents", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{CURRENCY_SYMBOL}{}", self.abs_decimal())
    }
}

/// Parses a Rand amount such as `250`, `250.5` or `250.00`. At most two decimal places are accepted.
impl FromStr for Cents {
    type Err = CentsConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        let valid_whole = !whole.is_empty() && whole.chars().all(|c| c.is_ascii_digit());
        let valid_frac = frac.len() <= 2 && frac.chars().all(|c| c.is_ascii_digit());
        if !valid_whole || !valid_frac || (digits.ends_with('.') && frac.is_empty()) {
            return Err(CentsConversionError(format!("'{s}' is not a valid Rand amount")));
        }
        let whole = whole.parse::<i64>().map_err(|e| CentsConversionError(format!("'{s}': {e}")))?;
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|e| CentsConversionError(e.to_string()))? * 10,
            _ => frac.parse::<i64>().map_err(|e| CentsConversionError(e.to_string()))?,
        };
        let value = whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(|| CentsConversionError(format!("'{s}' is too large")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_rand(rand: i64) -> Self {
        Self(rand * 100)
    }

    /// The amount as a plain decimal Rand string, e.g. `250.00`. This is the format the payment gateways expect.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{sign}{}", self.abs_decimal())
    }

    /// The given percentage of this amount, rounded half-up to the nearest cent. `None` if the result does not fit.
    pub fn percent(&self, percent: u32) -> Option<Self> {
        let scaled = i128::from(self.0) * i128::from(percent);
        let rounded = if scaled >= 0 { (scaled + 50) / 100 } else { (scaled - 50) / 100 };
        i64::try_from(rounded).ok().map(Self)
    }

    pub fn checked_mul(&self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    pub fn checked_sub(&self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    fn abs_decimal(&self) -> String {
        let abs = self.0.unsigned_abs();
        format!("{}.{:02}", abs / 100, abs % 100)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_rand_amounts() {
        assert_eq!(Cents::from_str("250.00").unwrap(), Cents::from(25_000));
        assert_eq!(Cents::from_str("250").unwrap(), Cents::from(25_000));
        assert_eq!(Cents::from_str("250.5").unwrap(), Cents::from(25_050));
        assert_eq!(Cents::from_str(" 0.07 ").unwrap(), Cents::from(7));
        assert_eq!(Cents::from_str("-12.34").unwrap(), Cents::from(-1234));
        assert!(Cents::from_str("250.001").is_err());
        assert!(Cents::from_str("250.").is_err());
        assert!(Cents::from_str("R250").is_err());
        assert!(Cents::from_str("").is_err());
        assert!(Cents::from_str("1e5").is_err());
    }

    #[test]
    fn display_as_rand() {
        assert_eq!(Cents::from(25_000).to_string(), "R250.00");
        assert_eq!(Cents::from(5).to_string(), "R0.05");
        assert_eq!(Cents::from(-1234).to_string(), "-R12.34");
        assert_eq!(Cents::from(22_500).to_decimal_string(), "225.00");
    }

    #[test]
    fn percentages_round_half_up() {
        assert_eq!(Cents::from(25_000).percent(10), Some(Cents::from(2_500)));
        assert_eq!(Cents::from(1_005).percent(10), Some(Cents::from(101)));
        assert_eq!(Cents::from(1_004).percent(10), Some(Cents::from(100)));
        assert_eq!(Cents::from(0).percent(10), Some(Cents::from(0)));
    }

    #[test]
    fn huge_amounts_do_not_overflow() {
        let huge = Cents::from_str("92233720368547758.07").unwrap();
        assert_eq!(huge, Cents::from(i64::MAX));
        assert_eq!(huge.percent(10), Some(Cents::from(922_337_203_685_477_581)));
        assert_eq!(huge.percent(200), None);
        assert_eq!(huge.checked_mul(2), None);
        assert_eq!(Cents::from(i64::MIN).checked_sub(Cents::from(1)), None);
        assert!(Cents::from_str("92233720368547758.08").is_err());
    }

    #[test]
    fn arithmetic() {
        let total = Cents::from_rand(250);
        let fee = total.percent(10).unwrap();
        assert_eq!(total - fee, Cents::from(22_500));
        assert_eq!(fee.checked_mul(3), Some(Cents::from(7_500)));
        assert_eq!(vec![fee, fee].into_iter().sum::<Cents>(), Cents::from(5_000));
    }
}
