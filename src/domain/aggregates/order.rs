//! Order Aggregate
//!
//! An order is a snapshot taken at submission time. Items copy name, price and
//! image from the cart so later catalog edits never alter historical orders.
//! Only `status` changes after placement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use crate::domain::aggregates::cart::Cart;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, OrderNumber, ProductId};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    order_number: OrderNumber,
    #[serde(flatten)]
    customer: Customer,
    #[serde(flatten)]
    delivery: Delivery,
    comment: Option<String>,
    items: Vec<OrderItem>,
    total_amount: Money,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer { pub full_name: String, pub phone: String, pub email: String, pub city: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "deliveryType", rename_all = "kebab-case")]
pub enum Delivery {
    PickupPoint { department: String },
    Address { address: String },
}

impl Delivery {
    pub fn kind(&self) -> &'static str {
        match self { Self::PickupPoint { .. } => "pickup-point", Self::Address { .. } => "address" }
    }
    pub fn department(&self) -> Option<&str> {
        match self { Self::PickupPoint { department } => Some(department), Self::Address { .. } => None }
    }
    pub fn address(&self) -> Option<&str> {
        match self { Self::Address { address } => Some(address), Self::PickupPoint { .. } => None }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Option<Money>,
    pub quantity: u32,
    pub image: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    New,
    Processing,
    Shipped,
    Completed,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Processing => write!(f, "processing"),
            Self::Shipped => write!(f, "shipped"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

impl Order {
    /// Snapshots `cart` into a new order with status `new`.
    pub fn place(
        order_number: OrderNumber,
        customer: Customer,
        delivery: Delivery,
        comment: Option<String>,
        cart: &Cart,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::NoItems); }
        let items: Vec<OrderItem> = cart.lines().iter().map(|line| OrderItem {
            product_id: line.product.id.clone(),
            name: line.product.name.clone(),
            price: line.product.price,
            quantity: line.quantity.value(),
            image: line.product.image.clone(),
        }).collect();
        let total_amount = cart.total_amount();
        let mut order = Self {
            order_number, customer, delivery, comment, items, total_amount,
            status: OrderStatus::New, created_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_number: order.order_number.clone(), total: total_amount, items: order.items.len(),
        }));
        Ok(order)
    }

    /// Rebuilds a stored order. No events are raised.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        order_number: OrderNumber, customer: Customer, delivery: Delivery, comment: Option<String>,
        items: Vec<OrderItem>, total_amount: Money, status: OrderStatus, created_at: DateTime<Utc>,
    ) -> Self {
        Self { order_number, customer, delivery, comment, items, total_amount, status, created_at, events: vec![] }
    }

    pub fn order_number(&self) -> &OrderNumber { &self.order_number }
    pub fn customer(&self) -> &Customer { &self.customer }
    pub fn delivery(&self) -> &Delivery { &self.delivery }
    pub fn comment(&self) -> Option<&str> { self.comment.as_deref() }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn total_amount(&self) -> Money { self.total_amount }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    /// Administrative status change. Returns `false` when the status is unchanged.
    pub fn set_status(&mut self, status: OrderStatus) -> bool {
        if self.status == status { return false; }
        let from = std::mem::replace(&mut self.status, status);
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged {
            order_number: self.order_number.clone(), from, to: status,
        }));
        true
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::cart::CartOp;
    use crate::domain::aggregates::product::{Category, Product};

    fn customer() -> Customer {
        Customer { full_name: "Іван Іванов".into(), phone: "+380501234567".into(), email: "ivan@example.com".into(), city: "Київ".into() }
    }

    fn cart() -> Cart {
        let p = Product::new(ProductId::new("1").unwrap(), "Deye", Category::Inverter).with_price(Money::from_units(42000));
        Cart::new().apply(CartOp::Add(p.clone())).apply(CartOp::Add(p))
    }

    #[test]
    fn test_order_snapshot() {
        let mut cart = cart();
        let mut order = Order::place(
            OrderNumber::from_time("ORD-", Utc::now()), customer(),
            Delivery::PickupPoint { department: "12".into() }, None, &cart, Utc::now(),
        ).unwrap();
        assert_eq!(order.status(), OrderStatus::New);
        assert_eq!(order.total_amount(), Money::from_units(84000));
        assert_eq!(order.items()[0].quantity, 2);
        cart = cart.apply(CartOp::Clear);
        assert!(cart.is_empty());
        assert_eq!(order.items().len(), 1);
        assert!(matches!(order.take_events().as_slice(), [DomainEvent::Order(OrderEvent::Placed { items: 1, .. })]));
    }

    #[test]
    fn test_empty_cart_rejected() {
        let err = Order::place(
            OrderNumber::from_time("ORD-", Utc::now()), customer(),
            Delivery::Address { address: "вул. Хрещатик, 1".into() }, None, &Cart::new(), Utc::now(),
        ).unwrap_err();
        assert_eq!(err, OrderError::NoItems);
    }

    #[test]
    fn test_status_change_raises_event() {
        let mut order = Order::place(
            OrderNumber::from_time("ORD-", Utc::now()), customer(),
            Delivery::PickupPoint { department: "1".into() }, None, &cart(), Utc::now(),
        ).unwrap();
        order.take_events();
        assert!(!order.set_status(OrderStatus::New));
        assert!(order.set_status(OrderStatus::Shipped));
        assert_eq!(order.status(), OrderStatus::Shipped);
        assert_eq!(order.take_events().len(), 1);
    }

    #[test]
    fn test_serialized_shape() {
        let order = Order::place(
            OrderNumber::from_time("ORD-", Utc::now()), customer(),
            Delivery::PickupPoint { department: "7".into() }, Some("після 18:00".into()), &cart(), Utc::now(),
        ).unwrap();
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["deliveryType"], "pickup-point");
        assert_eq!(json["department"], "7");
        assert_eq!(json["fullName"], "Іван Іванов");
        assert_eq!(json["status"], "new");
        assert_eq!(json["items"][0]["productId"], "1");
    }
}
