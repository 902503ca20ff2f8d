//! Postgres-backed catalog source, order sink and product sink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{info, instrument, warn};
use crate::admin::ProductSink;
use crate::catalog::{CatalogSource, SourceError};
use crate::checkout::{OrderSink, SinkError};
use crate::domain::aggregates::{BundleItem, Category, Customer, Delivery, Order, OrderItem, OrderStatus, Product, DEFAULT_STOCK};
use crate::domain::value_objects::{Money, OrderNumber, ProductId};

const PRODUCT_COLUMNS: &str = "id, name, category, sub_category, price, description, image, specs, \
    detailed_tech_specs, datasheet, stock, bundle_items, original_price";
const ORDER_COLUMNS: &str = "order_number, customer_name, customer_phone, customer_email, city, delivery_type, \
    department, address, comment, items, total_amount, status, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Builds the pool without connecting. Only a malformed URL fails here; an
    /// unreachable server surfaces on first use as a source or sink error.
    pub fn connect_lazy(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool { &self.pool }
}

fn sink_error(e: sqlx::Error) -> SinkError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => SinkError::Rejected(db.message().to_string()),
        _ => SinkError::Unavailable(e.to_string()),
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: String,
    name: Option<String>,
    category: Option<String>,
    sub_category: Option<String>,
    price: Option<Decimal>,
    description: Option<String>,
    image: Option<String>,
    specs: Option<String>,
    detailed_tech_specs: Option<String>,
    datasheet: Option<String>,
    stock: Option<i32>,
    bundle_items: Option<Json<Vec<BundleItem>>>,
    original_price: Option<Decimal>,
}

impl ProductRow {
    fn into_product(self) -> Product {
        let id = ProductId::new(self.id).unwrap_or_else(|_| ProductId::synthetic("db"));
        let name = self.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| crate::catalog::csv::UNTITLED.to_string());
        let mut product = Product::new(id, name, Category::parse_or_default(self.category.as_deref().unwrap_or_default()))
            .with_description(self.description.unwrap_or_default())
            .with_stock(self.stock.and_then(|s| u32::try_from(s).ok()).unwrap_or(DEFAULT_STOCK))
            .with_bundle(self.bundle_items.map(|Json(items)| items).unwrap_or_default());
        if let Some(image) = self.image.filter(|i| !i.trim().is_empty()) { product.image = image; }
        product.price = self.price.filter(|p| !p.is_sign_negative()).map(Money::new);
        product.original_price = self.original_price.map(Money::new);
        product.sub_category = self.sub_category;
        product.specs = self.specs;
        product.detailed_tech_specs = self.detailed_tech_specs;
        product.datasheet = self.datasheet;
        product
    }
}

#[derive(FromRow)]
struct OrderRow {
    order_number: String,
    customer_name: String,
    customer_phone: String,
    customer_email: String,
    city: String,
    delivery_type: String,
    department: Option<String>,
    address: Option<String>,
    comment: Option<String>,
    items: Json<Vec<OrderItem>>,
    total_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, SinkError> {
        let order_number = OrderNumber::parse(self.order_number)
            .ok_or_else(|| SinkError::Rejected("stored order has a blank number".into()))?;
        let delivery = match self.delivery_type.as_str() {
            "address" => Delivery::Address { address: self.address.unwrap_or_default() },
            _ => Delivery::PickupPoint { department: self.department.unwrap_or_default() },
        };
        let status = self.status.parse().unwrap_or_else(|e| {
            warn!(order_number = %order_number, error = %e, "Unknown stored order status");
            OrderStatus::default()
        });
        Ok(Order::restore(
            order_number,
            Customer { full_name: self.customer_name, phone: self.customer_phone, email: self.customer_email, city: self.city },
            delivery,
            self.comment,
            self.items.0,
            Money::new(self.total_amount),
            status,
            self.created_at,
        ))
    }
}

#[async_trait]
impl CatalogSource for PgStore {
    fn name(&self) -> &str { "postgres" }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Vec<Product>, SourceError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at, id"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        Ok(rows.into_iter().map(ProductRow::into_product).collect())
    }
}

#[async_trait]
impl OrderSink for PgStore {
    #[instrument(skip(self, order), fields(order_number = %order.order_number()))]
    async fn submit(&self, order: &Order) -> Result<(), SinkError> {
        sqlx::query(&format!("INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"))
            .bind(order.order_number().as_str())
            .bind(&order.customer().full_name)
            .bind(&order.customer().phone)
            .bind(&order.customer().email)
            .bind(&order.customer().city)
            .bind(order.delivery().kind())
            .bind(order.delivery().department())
            .bind(order.delivery().address())
            .bind(order.comment())
            .bind(Json(order.items()))
            .bind(order.total_amount().amount())
            .bind(order.status().to_string())
            .bind(order.created_at())
            .execute(&self.pool)
            .await
            .map_err(sink_error)?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Order>, SinkError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"))
            .fetch_all(&self.pool)
            .await
            .map_err(sink_error)?;
        rows.into_iter().map(OrderRow::into_order).collect()
    }

    #[instrument(skip(self))]
    async fn update_status(&self, order_number: &OrderNumber, status: OrderStatus) -> Result<Order, SinkError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"))
            .bind(order_number.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(sink_error)?
            .ok_or_else(|| SinkError::NotFound(order_number.to_string()))?;
        let mut order = row.into_order()?;
        if order.set_status(status) {
            sqlx::query("UPDATE orders SET status = $2 WHERE order_number = $1")
                .bind(order_number.as_str())
                .bind(status.to_string())
                .execute(&self.pool)
                .await
                .map_err(sink_error)?;
        }
        for event in order.take_events() {
            info!(event = ?event, "Domain event");
        }
        Ok(order)
    }
}

#[async_trait]
impl ProductSink for PgStore {
    #[instrument(skip(self, product), fields(id = %product.id))]
    async fn create(&self, product: &Product) -> Result<(), SinkError> {
        bind_product(sqlx::query(&format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        )), product)
        .execute(&self.pool)
        .await
        .map_err(sink_error)?;
        Ok(())
    }

    #[instrument(skip(self, product), fields(id = %product.id))]
    async fn update(&self, product: &Product) -> Result<(), SinkError> {
        bind_product(sqlx::query(&format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, category = EXCLUDED.category, \
             sub_category = EXCLUDED.sub_category, price = EXCLUDED.price, description = EXCLUDED.description, \
             image = EXCLUDED.image, specs = EXCLUDED.specs, detailed_tech_specs = EXCLUDED.detailed_tech_specs, \
             datasheet = EXCLUDED.datasheet, stock = EXCLUDED.stock, bundle_items = EXCLUDED.bundle_items, \
             original_price = EXCLUDED.original_price"
        )), product)
        .execute(&self.pool)
        .await
        .map_err(sink_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &ProductId) -> Result<(), SinkError> {
        sqlx::query("DELETE FROM products WHERE id = $1").bind(id.as_str()).execute(&self.pool).await.map_err(sink_error)?;
        Ok(())
    }
}

fn bind_product<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    product: &'q Product,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.category.as_str())
        .bind(product.sub_category.as_deref())
        .bind(product.price.map(|p| p.amount()))
        .bind(&product.description)
        .bind(&product.image)
        .bind(product.specs.as_deref())
        .bind(product.detailed_tech_specs.as_deref())
        .bind(product.datasheet.as_deref())
        .bind(i32::try_from(product.stock).unwrap_or(i32::MAX))
        .bind(Json(&product.bundle_items))
        .bind(product.original_price.map(|p| p.amount()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{builtin_catalog, CatalogResolver};

    // Nothing listens on port 1; the pool only finds out on first use.
    const UNREACHABLE: &str = "postgres://voltstore@127.0.0.1:1/voltstore";

    #[tokio::test]
    async fn test_malformed_url_is_rejected_up_front() {
        assert!(PgStore::connect_lazy("not a url", 1, Duration::from_millis(200)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_database_falls_through_to_fallback() {
        let db = PgStore::connect_lazy(UNREACHABLE, 1, Duration::from_millis(200)).unwrap();
        assert!(matches!(db.fetch().await, Err(SourceError::Unavailable(_))));

        let resolved = CatalogResolver::new(vec![Box::new(db.clone())]).resolve().await;
        assert_eq!(resolved.products.len(), builtin_catalog().len());
        assert!(matches!(OrderSink::list(&db).await, Err(SinkError::Unavailable(_))));
    }
}
