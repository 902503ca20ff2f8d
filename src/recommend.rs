//! System sizing from daily consumption and desired autonomy.

use serde::{Deserialize, Serialize};
use crate::domain::aggregates::{BundleItem, Category, Product};
use crate::domain::value_objects::{Money, ProductId};

/// Capacity margin over the raw energy need, covering depth of discharge and losses.
pub const BATTERY_MARGIN: f64 = 1.25;

const INVERTER_PRICE_PER_KW: f64 = 10_000.0;
const BATTERY_PRICE_PER_KWH: f64 = 8_000.0;
const SOLAR_PACKAGE_PRICE: f64 = 5_000.0;
const KIT_IMAGE: &str = "https://via.placeholder.com/400?text=Комплект";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub daily_consumption_kwh: f64,
    pub backup_hours: f64,
    pub inverter_kw: u32,
    pub battery_kwh: f64,
    pub explanation: String,
}

/// Negative and non-finite inputs are treated as zero.
pub fn recommend(daily_consumption_kwh: f64, backup_hours: f64) -> Recommendation {
    let consumption = non_negative(daily_consumption_kwh);
    let hours = non_negative(backup_hours);

    let inverter_kw = match consumption {
        c if c <= 4.0 => 3,
        c if c <= 8.0 => 5,
        c if c <= 12.0 => 8,
        _ => 10,
    };
    let required_kwh = consumption * hours / 24.0;
    let battery_kwh = (required_kwh * BATTERY_MARGIN * 10.0).round() / 10.0;
    let explanation = format!(
        "Для вашого споживання {consumption} кВт·год/добу та автономності {hours} годин рекомендуємо інвертор \
         {inverter_kw} кВт та акумулятори загальною ємністю ≈ {battery_kwh} кВт·год \
         (з урахуванням запасу та глибини розряду)."
    );
    Recommendation { daily_consumption_kwh: consumption, backup_hours: hours, inverter_kw, battery_kwh, explanation }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HouseType {
    #[default]
    Apartment,
    House,
    Commercial,
}

impl HouseType {
    fn label(&self) -> &'static str {
        match self { Self::Apartment => "квартири", Self::House => "будинку", Self::Commercial => "комерції" }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryType {
    #[default]
    Lifepo4,
    Gel,
    Agm,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KitPreferences {
    pub house_type: HouseType,
    pub budget: u32,
    pub solar_panels: bool,
    pub battery_type: BatteryType,
}

/// Builds a one-off kit product priced from the recommended sizes.
pub fn build_custom_kit(recommendation: &Recommendation, preferences: &KitPreferences) -> Product {
    let solar = if preferences.solar_panels { SOLAR_PACKAGE_PRICE } else { 0.0 };
    let price = (f64::from(recommendation.inverter_kw) * INVERTER_PRICE_PER_KW
        + recommendation.battery_kwh * BATTERY_PRICE_PER_KWH
        + solar)
        .round() as i64;

    let battery_type = format!("{:?}", preferences.battery_type).to_uppercase();
    let description = format!(
        "Комплект на основі ваших даних: споживання {} кВтг/добу, автономність {} год. Бюджет: {} грн. \
         Сонячні панелі: {}. Тип батареї: {battery_type}.",
        recommendation.daily_consumption_kwh,
        recommendation.backup_hours,
        preferences.budget,
        if preferences.solar_panels { "Так" } else { "Ні" },
    );

    let mut bundle = vec![
        BundleItem { name: "Інвертор".into(), quantity: 1 },
        BundleItem { name: "Батарея".into(), quantity: 1 },
    ];
    if preferences.solar_panels {
        bundle.push(BundleItem { name: "Сонячні панелі".into(), quantity: 1 });
    }

    let mut kit = Product::new(
        ProductId::synthetic("kit"),
        format!("Персональний комплект для {}", preferences.house_type.label()),
        Category::Kit,
    )
    .with_price(Money::from_units(price))
    .with_description(description)
    .with_image(KIT_IMAGE)
    .with_stock(1)
    .with_bundle(bundle);
    kit.specs = Some(format!(
        "Інвертор: {} кВт, Батарея: {} кВтг",
        recommendation.inverter_kw, recommendation.battery_kwh
    ));
    kit.detailed_tech_specs = Some(recommendation.explanation.clone());
    kit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_sizing() {
        let r = recommend(5.0, 8.0);
        assert_eq!(r.inverter_kw, 5);
        assert_eq!(r.battery_kwh, 2.1);
        assert!(r.explanation.contains("5 кВт·год/добу"));
        assert!(r.explanation.contains("≈ 2.1 кВт·год"));
        assert_eq!(r, recommend(5.0, 8.0));
    }

    #[test]
    fn test_inverter_breakpoints() {
        let sizes: Vec<u32> = [0.0, 4.0, 4.1, 8.0, 12.0, 12.5].iter().map(|&c| recommend(c, 1.0).inverter_kw).collect();
        assert_eq!(sizes, vec![3, 3, 5, 5, 8, 10]);
    }

    #[test]
    fn test_invalid_inputs_clamped() {
        let r = recommend(-3.0, f64::NAN);
        assert_eq!(r.inverter_kw, 3);
        assert_eq!(r.battery_kwh, 0.0);
    }

    #[test]
    fn test_custom_kit_price_and_bundle() {
        let r = recommend(10.0, 12.0);
        assert_eq!(r.battery_kwh, 6.3);
        let kit = build_custom_kit(&r, &KitPreferences { solar_panels: true, house_type: HouseType::House, ..Default::default() });
        assert_eq!(kit.price, Some(Money::from_units(8 * 10_000 + 50_400 + 5_000)));
        assert_eq!(kit.category, Category::Kit);
        assert_eq!(kit.stock, 1);
        assert_eq!(kit.bundle_items.len(), 3);
        assert!(kit.name.ends_with("будинку"));
        assert!(kit.id.as_str().starts_with("kit_"));

        let plain = build_custom_kit(&r, &KitPreferences::default());
        assert_eq!(plain.bundle_items.len(), 2);
        assert!(plain.description.contains("LIFEPO4"));
    }
}
