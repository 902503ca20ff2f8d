//! Domain events
use crate::domain::aggregates::order::OrderStatus;
use crate::domain::value_objects::{Money, OrderNumber, ProductId};

#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Order(OrderEvent),
    Catalog(CatalogEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum OrderEvent {
    Placed { order_number: OrderNumber, total: Money, items: usize },
    StatusChanged { order_number: OrderNumber, from: OrderStatus, to: OrderStatus },
}

#[derive(Clone, Debug, PartialEq)]
pub enum CatalogEvent {
    Resolved { source: String, products: usize },
    ProductSaved { product_id: ProductId, created: bool },
    ProductDeleted { product_id: ProductId },
}
