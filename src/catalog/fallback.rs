//! Built-in catalog used when every other source is empty or unavailable.

use async_trait::async_trait;
use crate::catalog::source::{CatalogSource, SourceError};
use crate::domain::aggregates::{BundleItem, Category, Product};
use crate::domain::value_objects::{Money, ProductId};

/// Always succeeds with [`builtin_catalog`].
pub struct FallbackSource;

#[async_trait]
impl CatalogSource for FallbackSource {
    fn name(&self) -> &str { "builtin" }

    async fn fetch(&self) -> Result<Vec<Product>, SourceError> {
        Ok(builtin_catalog())
    }
}

fn item(id: &str, name: &str, category: Category) -> Product {
    let id = ProductId::new(id).unwrap_or_else(|_| ProductId::synthetic("builtin"));
    Product::new(id, name, category)
}

fn bundle(items: &[(&str, u32)]) -> Vec<BundleItem> {
    items.iter().map(|(name, quantity)| BundleItem { name: (*name).to_string(), quantity: *quantity }).collect()
}

/// Deterministic, non-empty product list.
pub fn builtin_catalog() -> Vec<Product> {
    vec![
        item("1", "Deye SUN-5K-SG03LP1-EU", Category::Inverter)
            .with_price(Money::from_units(42000))
            .with_image("https://images.unsplash.com/photo-1613665813446-82a78c468a1d?auto=format&fit=crop&q=80&w=400")
            .with_description("Гібридний інвертор преміум класу з підтримкою сонячних панелей та АКБ.")
            .with_stock(12),
        item("2", "Pylontech US5000", Category::Battery)
            .with_sub_category("LiFePO4")
            .with_price(Money::from_units(58000))
            .with_image("https://images.unsplash.com/photo-1620714223084-8fcacc6dfd8d?auto=format&fit=crop&q=80&w=400")
            .with_description("Акумуляторний блок LiFePO4 48V для систем енергонезалежності.")
            .with_stock(25),
        item("k1", "Комплект \"Економ 3кВт\"", Category::Kit)
            .with_price(Money::from_units(31500))
            .with_original_price(Money::from_units(35000))
            .with_image("https://images.unsplash.com/photo-1592833159155-c62df1b65634?auto=format&fit=crop&q=80&w=400")
            .with_description("Готове рішення для квартири: базовий захист при відключеннях зі знижкою 10%.")
            .with_stock(8)
            .with_bundle(bundle(&[("Інвертор Must 3кВт", 1), ("АКБ AGM 100Ah 12V", 1), ("Комплект кабелів", 1)])),
        item("k2", "Комплект \"Автономність Pro 5кВт\"", Category::Kit)
            .with_price(Money::from_units(89000))
            .with_original_price(Money::from_units(98000))
            .with_image("https://images.unsplash.com/photo-1508514177221-188b1cf16e9d?auto=format&fit=crop&q=80&w=400")
            .with_description("Преміальний набір для дому. Купуючи комплектом, ви економите 9000 грн.")
            .with_stock(5)
            .with_bundle(bundle(&[("Інвертор Deye 5кВт", 1), ("АКБ Pylontech 4.8кВтг", 1), ("Силові перемички", 2)])),
        item("3", "Victron MultiPlus-II", Category::Inverter)
            .with_price(Money::from_units(38500))
            .with_image("https://images.unsplash.com/photo-1544724569-5f546fa6629d?auto=format&fit=crop&q=80&w=400")
            .with_description("Професійне європейське рішення для автономності оселі.")
            .with_stock(5),
        item("4", "Must PH18-5048 Plus", Category::Inverter)
            .with_price(Money::from_units(24000))
            .with_image("https://images.unsplash.com/photo-1558449028-b53a39d100fc?auto=format&fit=crop&q=80&w=400")
            .with_description("Надійний та бюджетний інвертор для приватного будинку.")
            .with_stock(30),
        item("5", "Dyness A48100", Category::Battery)
            .with_sub_category("LiFePO4")
            .with_price(Money::from_units(45000))
            .with_image("https://images.unsplash.com/photo-1611333523274-f97452e161aa?auto=format&fit=crop&q=80&w=400")
            .with_description("Сучасний літієвий акумулятор з ресурсом понад 6000 циклів.")
            .with_stock(15),
    ]
}
