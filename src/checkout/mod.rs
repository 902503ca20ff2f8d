//! Checkout: form validation and order submission.
//!
//! ```text
//! Editing -> Validating -> Submitting -> Succeeded
//!    ^  ^        |              |
//!    |  +--------+              v
//!    +------------(retry)---- Failed
//! ```
//!
//! `Failed` keeps the generic error message for display but is editable: the
//! next submit passes through `Editing` again.
//!
//! `Succeeded` is terminal for the cart it was built from; [`CheckoutPipeline::new_order`]
//! starts over. Only one submission may be in flight at a time.

pub mod sink;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use crate::domain::aggregates::{Cart, Customer, Delivery, Order};
use crate::domain::value_objects::OrderNumber;

pub use sink::{MemoryOrderSink, OrderSink, SinkError};

/// Shown to the shopper for any sink failure; the transport detail is only logged.
pub const SUBMISSION_FAILED: &str = "Помилка відправки замовлення. Спробуйте пізніше.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryType {
    #[default]
    #[serde(alias = "nova-poshta")]
    PickupPoint,
    Address,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutForm {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub city: String,
    pub delivery_type: DeliveryType,
    pub department: String,
    pub address: String,
    pub comment: String,
}

/// Field name (as the form names it) to a user-facing message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, &'static str>);

impl FieldErrors {
    pub fn get(&self, field: &str) -> Option<&'static str> { self.0.get(field).copied() }
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ { self.0.keys().copied() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn len(&self) -> usize { self.0.len() }

    fn require(&mut self, field: &'static str, value: &str, message: &'static str) {
        if value.trim().is_empty() { self.0.insert(field, message); }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<_> = self.fields().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

/// A form that passed validation, trimmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidForm {
    pub customer: Customer,
    pub delivery: Delivery,
    pub comment: Option<String>,
}

impl CheckoutForm {
    /// Required fields must be non-blank; only the active delivery type's field is checked.
    pub fn validate(&self) -> Result<ValidForm, FieldErrors> {
        let mut errors = FieldErrors::default();
        errors.require("fullName", &self.full_name, "Вкажіть ПІБ");
        errors.require("phone", &self.phone, "Вкажіть телефон");
        errors.require("email", &self.email, "Вкажіть email");
        errors.require("city", &self.city, "Вкажіть місто");
        match self.delivery_type {
            DeliveryType::PickupPoint => errors.require("department", &self.department, "Вкажіть відділення"),
            DeliveryType::Address => errors.require("address", &self.address, "Вкажіть адресу"),
        }
        if !errors.is_empty() { return Err(errors); }

        let delivery = match self.delivery_type {
            DeliveryType::PickupPoint => Delivery::PickupPoint { department: self.department.trim().to_string() },
            DeliveryType::Address => Delivery::Address { address: self.address.trim().to_string() },
        };
        let comment = Some(self.comment.trim()).filter(|c| !c.is_empty()).map(str::to_string);
        Ok(ValidForm {
            customer: Customer {
                full_name: self.full_name.trim().to_string(),
                phone: self.phone.trim().to_string(),
                email: self.email.trim().to_string(),
                city: self.city.trim().to_string(),
            },
            delivery,
            comment,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CheckoutState {
    #[default]
    Editing,
    Validating,
    Submitting,
    Succeeded { order_number: OrderNumber },
    Failed { message: String },
}

impl CheckoutState {
    /// Whether the form may be changed and submitted again.
    pub fn is_editable(&self) -> bool { matches!(self, Self::Editing | Self::Failed { .. }) }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Validation(FieldErrors),
    #[error("cart is empty")]
    EmptyCart,
    #[error("an order is already being submitted")]
    InFlight,
    #[error("order already placed; start a new order first")]
    AlreadyCompleted,
    #[error("{}", SUBMISSION_FAILED)]
    Submission(#[source] SinkError),
}

pub struct CheckoutPipeline {
    sink: Arc<dyn OrderSink>,
    order_prefix: String,
    state: Mutex<CheckoutState>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag on every exit path.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) { self.0.store(false, Ordering::SeqCst); }
}

impl CheckoutPipeline {
    pub fn new(sink: Arc<dyn OrderSink>, order_prefix: impl Into<String>) -> Self {
        Self { sink, order_prefix: order_prefix.into(), state: Mutex::new(CheckoutState::Editing), in_flight: AtomicBool::new(false) }
    }

    pub fn state(&self) -> CheckoutState { self.state.lock().unwrap_or_else(PoisonError::into_inner).clone() }

    pub fn sink(&self) -> &Arc<dyn OrderSink> { &self.sink }

    fn transition(&self, next: CheckoutState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Validates `form`, snapshots `cart` into an order and hands it to the sink.
    ///
    /// The caller owns the cart and takes the ordered lines out of it on
    /// success. On any error the form and cart are left as they were.
    #[instrument(skip_all)]
    pub async fn submit(&self, form: &CheckoutForm, cart: &Cart) -> Result<OrderNumber, CheckoutError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("Rejected concurrent checkout submission");
            return Err(CheckoutError::InFlight);
        }
        let _guard = InFlight(&self.in_flight);

        match self.state() {
            CheckoutState::Succeeded { .. } => return Err(CheckoutError::AlreadyCompleted),
            CheckoutState::Failed { .. } => {
                debug!("Retrying checkout after failed submission");
                self.transition(CheckoutState::Editing);
            }
            _ => {}
        }

        self.transition(CheckoutState::Validating);
        let valid = match form.validate() {
            Ok(valid) => valid,
            Err(errors) => {
                debug!(fields = %errors, "Checkout form rejected");
                self.transition(CheckoutState::Editing);
                return Err(CheckoutError::Validation(errors));
            }
        };
        let now = Utc::now();
        let order_number = OrderNumber::from_time(&self.order_prefix, now);
        let Ok(mut order) = Order::place(order_number.clone(), valid.customer, valid.delivery, valid.comment, cart, now) else {
            self.transition(CheckoutState::Editing);
            return Err(CheckoutError::EmptyCart);
        };

        self.transition(CheckoutState::Submitting);
        match self.sink.submit(&order).await {
            Ok(()) => {
                for event in order.take_events() {
                    info!(event = ?event, "Domain event");
                }
                info!(order_number = %order_number, total = %order.total_amount(), "Order submitted");
                self.transition(CheckoutState::Succeeded { order_number: order_number.clone() });
                Ok(order_number)
            }
            Err(e) => {
                error!(order_number = %order_number, error = %e, "Order submission failed");
                self.transition(CheckoutState::Failed { message: SUBMISSION_FAILED.to_string() });
                Err(CheckoutError::Submission(e))
            }
        }
    }

    /// Leaves `Succeeded` (or any other state) for a fresh `Editing`.
    pub fn new_order(&self) { self.transition(CheckoutState::Editing); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use crate::domain::aggregates::{CartOp, Category, OrderStatus, Product};
    use crate::domain::value_objects::{Money, ProductId};

    fn form() -> CheckoutForm {
        CheckoutForm {
            full_name: " Іван Іванов ".into(),
            phone: "+380501234567".into(),
            email: "ivan@example.com".into(),
            city: "Київ".into(),
            department: "№12".into(),
            ..Default::default()
        }
    }

    fn cart() -> Cart {
        let p = Product::new(ProductId::new("1").unwrap(), "Deye SUN-5K", Category::Inverter).with_price(Money::from_units(42000));
        Cart::new().apply(CartOp::Add(p))
    }

    #[test]
    fn test_conditional_delivery_fields() {
        let mut f = form();
        f.department.clear();
        f.address = "вул. Хрещатик 1".into();
        assert_eq!(f.validate().unwrap_err().fields().collect::<Vec<_>>(), vec!["department"]);

        f.delivery_type = DeliveryType::Address;
        let valid = f.validate().unwrap();
        assert_eq!(valid.delivery, Delivery::Address { address: "вул. Хрещатик 1".into() });
        assert_eq!(valid.customer.full_name, "Іван Іванов");
        assert_eq!(valid.comment, None);

        f.address = "   ".into();
        assert_eq!(f.validate().unwrap_err().get("address"), Some("Вкажіть адресу"));
    }

    #[test]
    fn test_form_deserializes_legacy_delivery_name() {
        let f: CheckoutForm = serde_json::from_str(r#"{"fullName":"A","deliveryType":"nova-poshta"}"#).unwrap();
        assert_eq!(f.delivery_type, DeliveryType::PickupPoint);
        assert!(f.phone.is_empty());
    }

    #[tokio::test]
    async fn test_blank_name_never_reaches_sink() {
        let sink = Arc::new(MemoryOrderSink::new());
        let pipeline = CheckoutPipeline::new(sink.clone(), "ORD-");
        let mut f = form();
        f.full_name = "  ".into();
        match pipeline.submit(&f, &cart()).await {
            Err(CheckoutError::Validation(errors)) => assert_eq!(errors.get("fullName"), Some("Вкажіть ПІБ")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(sink.is_empty());
        assert_eq!(pipeline.state(), CheckoutState::Editing);
    }

    #[tokio::test]
    async fn test_success_is_terminal_until_new_order() {
        let sink = Arc::new(MemoryOrderSink::new());
        let pipeline = CheckoutPipeline::new(sink.clone(), "ORD-");
        let number = pipeline.submit(&form(), &cart()).await.unwrap();
        assert!(number.as_str().starts_with("ORD-"));
        assert_eq!(number.as_str().len(), "ORD-".len() + 6);
        assert_eq!(pipeline.state(), CheckoutState::Succeeded { order_number: number.clone() });

        assert!(matches!(pipeline.submit(&form(), &cart()).await, Err(CheckoutError::AlreadyCompleted)));
        assert_eq!(sink.len(), 1);

        let stored = sink.list().await.unwrap();
        assert_eq!(stored[0].status(), OrderStatus::New);
        assert_eq!(stored[0].customer().full_name, "Іван Іванов");

        pipeline.new_order();
        assert_eq!(pipeline.state(), CheckoutState::Editing);
    }

    #[tokio::test]
    async fn test_sink_failure_allows_retry() {
        let sink = Arc::new(MemoryOrderSink::new());
        sink.set_available(false);
        let pipeline = CheckoutPipeline::new(sink.clone(), "ORD-");
        let err = pipeline.submit(&form(), &cart()).await.unwrap_err();
        assert_eq!(err.to_string(), SUBMISSION_FAILED);
        assert_eq!(pipeline.state(), CheckoutState::Failed { message: SUBMISSION_FAILED.to_string() });
        assert!(pipeline.state().is_editable());

        // A retry with a broken form lands back in Editing, not Failed.
        let mut blank = form();
        blank.phone.clear();
        assert!(matches!(pipeline.submit(&blank, &cart()).await, Err(CheckoutError::Validation(_))));
        assert_eq!(pipeline.state(), CheckoutState::Editing);

        sink.set_available(true);
        let number = pipeline.submit(&form(), &cart()).await.unwrap();
        assert_eq!(sink.len(), 1);
        assert!(!CheckoutState::Succeeded { order_number: number }.is_editable());
    }

    #[tokio::test]
    async fn test_empty_cart_rejected_after_validation() {
        let pipeline = CheckoutPipeline::new(Arc::new(MemoryOrderSink::new()), "ORD-");
        assert!(matches!(pipeline.submit(&form(), &Cart::new()).await, Err(CheckoutError::EmptyCart)));
        assert_eq!(pipeline.state(), CheckoutState::Editing);
    }

    struct SlowSink(MemoryOrderSink);

    #[async_trait]
    impl OrderSink for SlowSink {
        async fn submit(&self, order: &Order) -> Result<(), SinkError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.0.submit(order).await
        }
        async fn list(&self) -> Result<Vec<Order>, SinkError> { self.0.list().await }
        async fn update_status(&self, n: &OrderNumber, s: OrderStatus) -> Result<Order, SinkError> {
            self.0.update_status(n, s).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_submit_is_rejected() {
        let sink = Arc::new(SlowSink(MemoryOrderSink::new()));
        let pipeline = CheckoutPipeline::new(sink.clone(), "ORD-");
        let (f, c) = (form(), cart());
        let (first, second) = tokio::join!(pipeline.submit(&f, &c), pipeline.submit(&f, &c));
        assert!(first.is_ok());
        assert!(matches!(second, Err(CheckoutError::InFlight)));
        assert_eq!(sink.0.len(), 1);
    }
}
