//! Value Objects for the storefront

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Product identity, stable across catalog sources. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductId(String);

impl ProductId {
    pub fn new(value: impl Into<String>) -> Result<Self, ProductIdError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(ProductIdError::Empty); }
        Ok(Self(value))
    }

    /// Generates a unique id for records whose source could not supply one.
    pub fn synthetic(prefix: &str) -> Self {
        Self(format!("{prefix}_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl TryFrom<String> for ProductId {
    type Error = ProductIdError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<ProductId> for String {
    fn from(id: ProductId) -> Self { id.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductIdError {
    #[error("product id is empty")]
    Empty,
}

/// Amount in the store currency (hryvnia). The store is single-currency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn from_units(units: i64) -> Self { Self(Decimal::from(units)) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn add(&self, other: &Money) -> Money { Money(self.0 + other.0) }
    pub fn multiply(&self, qty: Quantity) -> Money { Money(self.0 * Decimal::from(qty.value())) }
    pub fn is_positive(&self) -> bool { self.0 > Decimal::ZERO }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} ₴", self.0.normalize()) }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self { iter.fold(Money::ZERO, |acc, m| acc.add(&m)) }
}

/// Strictly positive line quantity. Zero and negatives are not representable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    /// Returns `None` for `value <= 0`. Values above `u32::MAX` saturate.
    pub fn new(value: i64) -> Option<Self> {
        if value <= 0 {
            return None;
        }
        Some(Self(u32::try_from(value).unwrap_or(u32::MAX)))
    }

    pub fn value(&self) -> u32 { self.0 }
    pub fn increment(&self) -> Self { Self(self.0.saturating_add(1)) }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 { Err(QuantityError::Zero) } else { Ok(Self(value)) }
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self { q.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity must be positive")]
    Zero,
}

/// Human-facing order number: a prefix followed by a time-derived numeric suffix.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const SUFFIX_DIGITS: u32 = 6;

    /// Takes the last six digits of the submission time in milliseconds.
    pub fn from_time(prefix: &str, at: DateTime<Utc>) -> Self {
        let modulus = 10_i64.pow(Self::SUFFIX_DIGITS);
        let suffix = at.timestamp_millis().rem_euclid(modulus);
        Self(format!("{prefix}{suffix:06}"))
    }

    pub fn parse(value: impl Into<String>) -> Option<Self> {
        let value = value.into().trim().to_string();
        (!value.is_empty()).then_some(Self(value))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_product_id() {
        assert_eq!(ProductId::new("  k1 ").unwrap().as_str(), "k1");
        assert_eq!(ProductId::new("   "), Err(ProductIdError::Empty));
        assert!(serde_json::from_str::<ProductId>("\"\"").is_err());
    }

    #[test]
    fn test_synthetic_ids_are_unique() {
        let a = ProductId::synthetic("csv");
        let b = ProductId::synthetic("csv");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("csv_"));
    }

    #[test]
    fn test_quantity_rejects_non_positive() {
        assert!(Quantity::new(0).is_none());
        assert!(Quantity::new(-3).is_none());
        assert_eq!(Quantity::new(4).unwrap().value(), 4);
        assert_eq!(Quantity::new(5_000_000_000).unwrap().value(), u32::MAX);
        assert!(serde_json::from_str::<Quantity>("0").is_err());
    }

    #[test]
    fn test_money_multiply() {
        let price = Money::from_units(42000);
        assert_eq!(price.multiply(Quantity::new(2).unwrap()), Money::from_units(84000));
        assert_eq!(price.to_string(), "42000 ₴");
    }

    #[test]
    fn test_order_number_suffix() {
        let at = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        assert_eq!(OrderNumber::from_time("ORD-", at).as_str(), "ORD-123456");
        let early = Utc.timestamp_millis_opt(42).unwrap();
        assert_eq!(OrderNumber::from_time("ORD-", early).as_str(), "ORD-000042");
    }
}
