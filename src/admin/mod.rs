//! Administrative operations on products and orders.
//!
//! Role checks happen in [`crate::storefront::Storefront`]; this module owns
//! validation and the product sink.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::instrument;
use validator::{Validate, ValidationError, ValidationErrors};
use crate::checkout::{OrderSink, SinkError};
use crate::domain::aggregates::{BundleItem, Category, Order, OrderStatus, Product, DEFAULT_STOCK};
use crate::domain::value_objects::{Money, OrderNumber, ProductId};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("administrator role required")]
    Forbidden,
    #[error("invalid product: {0}")]
    Invalid(#[from] ValidationErrors),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

#[async_trait]
pub trait ProductSink: Send + Sync {
    /// Fails with [`SinkError::Rejected`] when the id already exists.
    async fn create(&self, product: &Product) -> Result<(), SinkError>;
    /// Replaces the record with the same id, inserting it if absent.
    async fn update(&self, product: &Product) -> Result<(), SinkError>;
    /// Deleting an unknown id is not an error.
    async fn delete(&self, id: &ProductId) -> Result<(), SinkError>;
}

#[derive(Default)]
pub struct MemoryProductSink {
    products: Mutex<Vec<Product>>,
}

impl MemoryProductSink {
    pub fn new() -> Self { Self::default() }

    pub fn products(&self) -> Vec<Product> { self.products.lock().unwrap_or_else(PoisonError::into_inner).clone() }
}

#[async_trait]
impl ProductSink for MemoryProductSink {
    async fn create(&self, product: &Product) -> Result<(), SinkError> {
        let mut products = self.products.lock().unwrap_or_else(PoisonError::into_inner);
        if products.iter().any(|p| p.id == product.id) {
            return Err(SinkError::Rejected(format!("product {} already exists", product.id)));
        }
        products.push(product.clone());
        Ok(())
    }

    async fn update(&self, product: &Product) -> Result<(), SinkError> {
        let mut products = self.products.lock().unwrap_or_else(PoisonError::into_inner);
        match products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => *existing = product.clone(),
            None => products.push(product.clone()),
        }
        Ok(())
    }

    async fn delete(&self, id: &ProductId) -> Result<(), SinkError> {
        self.products.lock().unwrap_or_else(PoisonError::into_inner).retain(|p| &p.id != id);
        Ok(())
    }
}

/// Product as submitted from the admin form.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductDraft {
    #[validate(length(min = 1, message = "Вкажіть ID товару"))]
    pub id: String,
    #[validate(length(min = 1, message = "Вкажіть назву"))]
    pub name: String,
    pub category: Category,
    pub sub_category: Option<String>,
    #[validate(required(message = "Ціна повинна бути більше 0"), custom(function = "positive_price", message = "Ціна повинна бути більше 0"))]
    pub price: Option<Money>,
    #[validate(length(min = 1, message = "Додайте опис"))]
    pub description: String,
    #[validate(length(min = 1, message = "Вкажіть посилання на зображення"))]
    pub image: String,
    pub specs: Option<String>,
    pub detailed_tech_specs: Option<String>,
    pub datasheet: Option<String>,
    pub stock: Option<u32>,
    pub bundle_items: Vec<BundleItem>,
    pub original_price: Option<Money>,
}

fn positive_price(price: &Money) -> Result<(), ValidationError> {
    if price.is_positive() { Ok(()) } else { Err(ValidationError::new("positive_price")) }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ProductDraft {
    /// Trims text fields, validates, and builds the product.
    pub fn into_product(mut self) -> Result<Product, AdminError> {
        for field in [&mut self.id, &mut self.name, &mut self.description, &mut self.image] {
            *field = field.trim().to_string();
        }
        self.validate()?;
        let (Ok(id), Some(price)) = (ProductId::new(self.id), self.price) else {
            return Err(AdminError::Invalid(ValidationErrors::new()));
        };
        let mut product = Product::new(id, self.name, self.category)
            .with_price(price)
            .with_description(self.description)
            .with_image(self.image)
            .with_stock(self.stock.unwrap_or(DEFAULT_STOCK))
            .with_bundle(self.bundle_items);
        product.sub_category = non_blank(self.sub_category);
        product.specs = non_blank(self.specs);
        product.detailed_tech_specs = non_blank(self.detailed_tech_specs);
        product.datasheet = non_blank(self.datasheet);
        product.original_price = self.original_price;
        Ok(product)
    }
}

/// Product and order writes routed to their sinks.
pub struct AdminConsole {
    orders: Arc<dyn OrderSink>,
    products: Arc<dyn ProductSink>,
}

impl AdminConsole {
    pub fn new(orders: Arc<dyn OrderSink>, products: Arc<dyn ProductSink>) -> Self { Self { orders, products } }

    /// Newest first.
    pub async fn orders(&self) -> Result<Vec<Order>, AdminError> { Ok(self.orders.list().await?) }

    #[instrument(skip(self))]
    pub async fn set_order_status(&self, order_number: &OrderNumber, status: OrderStatus) -> Result<Order, AdminError> {
        Ok(self.orders.update_status(order_number, status).await?)
    }

    /// Creates when `is_new`, otherwise updates.
    #[instrument(skip(self, draft), fields(id = %draft.id))]
    pub async fn save_product(&self, draft: ProductDraft, is_new: bool) -> Result<Product, AdminError> {
        let product = draft.into_product()?;
        if is_new {
            self.products.create(&product).await?;
        } else {
            self.products.update(&product).await?;
        }
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), AdminError> {
        Ok(self.products.delete(id).await?)
    }
}
