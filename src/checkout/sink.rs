//! Order sink: the external system that durably accepts submitted orders.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::info;
use crate::domain::aggregates::{Order, OrderStatus};
use crate::domain::value_objects::OrderNumber;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error("sink rejected the write: {0}")]
    Rejected(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait OrderSink: Send + Sync {
    /// Exactly one call per accepted submission.
    async fn submit(&self, order: &Order) -> Result<(), SinkError>;
    /// Newest first.
    async fn list(&self) -> Result<Vec<Order>, SinkError>;
    async fn update_status(&self, order_number: &OrderNumber, status: OrderStatus) -> Result<Order, SinkError>;
}

/// In-process sink. `set_available(false)` makes every call fail with
/// [`SinkError::Unavailable`].
pub struct MemoryOrderSink {
    orders: Mutex<Vec<Order>>,
    available: AtomicBool,
}

impl Default for MemoryOrderSink {
    fn default() -> Self { Self { orders: Mutex::new(vec![]), available: AtomicBool::new(true) } }
}

impl MemoryOrderSink {
    pub fn new() -> Self { Self::default() }

    pub fn set_available(&self, available: bool) { self.available.store(available, Ordering::SeqCst); }

    pub fn len(&self) -> usize { self.orders.lock().unwrap_or_else(PoisonError::into_inner).len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn check(&self) -> Result<(), SinkError> {
        if self.available.load(Ordering::SeqCst) { Ok(()) } else { Err(SinkError::Unavailable("memory sink offline".into())) }
    }
}

#[async_trait]
impl OrderSink for MemoryOrderSink {
    async fn submit(&self, order: &Order) -> Result<(), SinkError> {
        self.check()?;
        let mut orders = self.orders.lock().unwrap_or_else(PoisonError::into_inner);
        if orders.iter().any(|o| o.order_number() == order.order_number()) {
            return Err(SinkError::Rejected(format!("duplicate order number {}", order.order_number())));
        }
        orders.push(order.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Order>, SinkError> {
        self.check()?;
        let mut orders = self.orders.lock().unwrap_or_else(PoisonError::into_inner).clone();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    async fn update_status(&self, order_number: &OrderNumber, status: OrderStatus) -> Result<Order, SinkError> {
        self.check()?;
        let mut orders = self.orders.lock().unwrap_or_else(PoisonError::into_inner);
        let order = orders
            .iter_mut()
            .find(|o| o.order_number() == order_number)
            .ok_or_else(|| SinkError::NotFound(order_number.to_string()))?;
        order.set_status(status);
        for event in order.take_events() {
            info!(event = ?event, "Domain event");
        }
        Ok(order.clone())
    }
}
