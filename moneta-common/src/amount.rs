use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AmountError {
    #[error("Invalid amount: {0}")]
    Parse(String),

    #[error("Amount overflow")]
    Overflow,
}

/// A monetary amount in base units of some token.
///
/// Different chains use different decimal scales, so amounts travel as
/// arbitrary-precision decimal strings and are never represented as
/// floating point. Serialized form is the plain decimal string
/// (e.g. `"10000000000"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(Decimal);

impl Amount {
    pub fn zero() -> Self {
        Amount(Decimal::ZERO)
    }

    pub fn new(value: Decimal) -> Self {
        Amount(value)
    }

    pub fn parse(s: &str) -> Result<Self, AmountError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Parse("empty string".to_string()));
        }
        Decimal::from_str(trimmed)
            .map(Amount)
            .map_err(|e| AmountError::Parse(format!("{}: {}", trimmed, e)))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn abs(&self) -> Self {
        Amount(self.0.abs())
    }

    pub fn neg(&self) -> Self {
        Amount(-self.0)
    }

    pub fn checked_add(&self, other: &Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    pub fn checked_sub(&self, other: &Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    /// Sums an iterator of amounts, failing on overflow instead of wrapping.
    pub fn sum<'a, I: IntoIterator<Item = &'a Amount>>(iter: I) -> Result<Amount, AmountError> {
        let mut total = Amount::zero();
        for amount in iter {
            total = total.checked_add(amount)?;
        }
        Ok(total)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl TryFrom<String> for Amount {
    type Error = AmountError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Amount::parse(&s)
    }
}

impl From<Amount> for String {
    fn from(a: Amount) -> Self {
        a.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base_unit_strings() {
        let a = Amount::parse("10000000000").unwrap();
        assert_eq!(a.to_string(), "10000000000");
        assert!(!a.is_negative());
    }

    #[test]
    fn parses_signed_amounts() {
        let a = Amount::parse("-250").unwrap();
        assert!(a.is_negative());
        assert_eq!(a.abs().to_string(), "250");
    }

    #[test]
    fn rejects_garbage() {
        assert!(Amount::parse("").is_err());
        assert!(Amount::parse("12abc").is_err());
    }

    #[test]
    fn checked_arithmetic() {
        let a = Amount::parse("100").unwrap();
        let b = Amount::parse("-30").unwrap();
        assert_eq!(a.checked_add(&b).unwrap().to_string(), "70");
        assert_eq!(a.checked_sub(&b).unwrap().to_string(), "130");
    }

    #[test]
    fn serializes_as_string() {
        let a = Amount::parse("42").unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"42\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
