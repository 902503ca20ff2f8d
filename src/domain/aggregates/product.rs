//! Product Aggregate

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::domain::value_objects::{Money, ProductId};

pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/400";
/// Stock assumed when a source does not report one.
pub const DEFAULT_STOCK: u32 = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    /// `None` means "price on request", which is not the same as free.
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_tech_specs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasheet: Option<String>,
    #[serde(default = "default_stock")]
    pub stock: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bundle_items: Vec<BundleItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Money>,
}

fn default_image() -> String { PLACEHOLDER_IMAGE.to_string() }
fn default_stock() -> u32 { DEFAULT_STOCK }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleItem { pub name: String, pub quantity: u32 }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    Inverter,
    Battery,
    SolarPanel,
    Kit,
}

impl Category {
    pub const ALL: [Category; 4] = [Self::Inverter, Self::Battery, Self::SolarPanel, Self::Kit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inverter => "inverter",
            Self::Battery => "battery",
            Self::SolarPanel => "solar_panel",
            Self::Kit => "kit",
        }
    }

    /// Lenient parse used by importers: blank or unknown values become the default.
    pub fn parse_or_default(value: &str) -> Self { value.parse().unwrap_or_default() }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("invalid category: {s}"))
    }
}

/// Savings shown for bundles sold below the sum of their parts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Discount { pub savings: Money, pub percent: u32 }

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, category: Category) -> Self {
        Self {
            id, name: name.into(), category, sub_category: None, price: None,
            description: String::new(), image: default_image(), specs: None,
            detailed_tech_specs: None, datasheet: None, stock: DEFAULT_STOCK,
            bundle_items: vec![], original_price: None,
        }
    }

    pub fn with_price(mut self, price: Money) -> Self { self.price = Some(price); self }
    pub fn with_sub_category(mut self, sub: impl Into<String>) -> Self { self.sub_category = Some(sub.into()); self }
    pub fn with_description(mut self, description: impl Into<String>) -> Self { self.description = description.into(); self }
    pub fn with_image(mut self, image: impl Into<String>) -> Self { self.image = image.into(); self }
    pub fn with_stock(mut self, stock: u32) -> Self { self.stock = stock; self }
    pub fn with_original_price(mut self, price: Money) -> Self { self.original_price = Some(price); self }
    pub fn with_bundle(mut self, items: Vec<BundleItem>) -> Self { self.bundle_items = items; self }

    pub fn is_price_on_request(&self) -> bool { self.price.is_none() }

    /// Splits the flat `specs` string into ordered `(key, value)` pairs.
    ///
    /// Entries are separated by `,` or `;`; the key ends at the first `:`.
    /// Entries without a key or value are skipped.
    pub fn spec_pairs(&self) -> Vec<(String, String)> {
        let Some(specs) = self.specs.as_deref() else { return vec![] };
        specs
            .split([',', ';'])
            .filter_map(|entry| {
                let (k, v) = entry.split_once(':')?;
                let (k, v) = (k.trim(), v.trim());
                (!k.is_empty() && !v.is_empty()).then(|| (k.to_string(), v.to_string()))
            })
            .collect()
    }

    pub fn discount(&self) -> Option<Discount> {
        let price = self.price?;
        let original = self.original_price?;
        if original <= price || !original.is_positive() { return None; }
        let savings = original.amount() - price.amount();
        let percent = (savings * Decimal::ONE_HUNDRED / original.amount()).round().to_u32()?;
        Some(Discount { savings: Money::new(savings), percent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inverter() -> Product {
        Product::new(ProductId::new("1").unwrap(), "Deye SUN-5K", Category::Inverter)
    }

    #[test]
    fn test_product_defaults() {
        let p = inverter();
        assert!(p.is_price_on_request());
        assert_eq!(p.image, PLACEHOLDER_IMAGE);
        assert_eq!(p.stock, DEFAULT_STOCK);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Solar_Panel".parse::<Category>(), Ok(Category::SolarPanel));
        assert_eq!(Category::parse_or_default(""), Category::Inverter);
        assert_eq!(Category::parse_or_default("cable"), Category::Inverter);
    }

    #[test]
    fn test_spec_pairs() {
        let mut p = inverter();
        p.specs = Some("Потужність: 5 кВт, Фази:1; broken, Напруга: 48:V".into());
        assert_eq!(p.spec_pairs(), vec![
            ("Потужність".to_string(), "5 кВт".to_string()),
            ("Фази".to_string(), "1".to_string()),
            ("Напруга".to_string(), "48:V".to_string()),
        ]);
    }

    #[test]
    fn test_kit_discount() {
        let kit = Product::new(ProductId::new("k1").unwrap(), "Економ 3кВт", Category::Kit)
            .with_price(Money::from_units(31500))
            .with_original_price(Money::from_units(35000));
        assert_eq!(kit.discount(), Some(Discount { savings: Money::from_units(3500), percent: 10 }));
        assert!(inverter().with_price(Money::from_units(100)).discount().is_none());
    }

    #[test]
    fn test_deserialize_minimal_record() {
        let p: Product = serde_json::from_str(r#"{"id":"2","name":"Pylontech US5000","category":"battery","price":58000}"#).unwrap();
        assert_eq!(p.price, Some(Money::from_units(58000)));
        assert_eq!(p.stock, DEFAULT_STOCK);
        let missing_price: Product = serde_json::from_str(r#"{"id":"3","name":"X","category":"kit","price":null}"#).unwrap();
        assert!(missing_price.is_price_on_request());
    }
}
