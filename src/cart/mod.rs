//! Cart store: the persisted shell around the pure [`Cart`] aggregate.
//!
//! The store is the single writer of the cart key. It hydrates once at
//! construction and writes the full cart after every mutation.

pub mod storage;

use std::sync::Arc;
use tracing::{error, warn};
use crate::domain::aggregates::{Cart, CartOp, Product};
use crate::domain::value_objects::ProductId;

pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};

pub const CART_KEY: &str = "voltstore_cart";

pub struct CartStore {
    cart: Cart,
    storage: Arc<dyn KeyValueStore>,
}

impl CartStore {
    /// Missing, unreadable or corrupt stored values yield an empty cart.
    pub fn hydrate(storage: Arc<dyn KeyValueStore>) -> Self {
        let cart = match storage.get(CART_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<Cart>(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Stored cart is corrupt, starting empty");
                Cart::new()
            }),
            Ok(None) => Cart::new(),
            Err(e) => {
                warn!(error = %e, "Stored cart is unreadable, starting empty");
                Cart::new()
            }
        };
        Self { cart, storage }
    }

    pub fn cart(&self) -> &Cart { &self.cart }

    /// Applies `op` and persists the result.
    pub fn dispatch(&mut self, op: CartOp) -> &Cart {
        let current = std::mem::take(&mut self.cart);
        self.cart = current.apply(op);
        self.persist();
        &self.cart
    }

    pub fn add_item(&mut self, product: Product) -> &Cart { self.dispatch(CartOp::Add(product)) }

    pub fn set_quantity(&mut self, product_id: ProductId, quantity: i64) -> &Cart {
        self.dispatch(CartOp::SetQuantity { product_id, quantity })
    }

    pub fn remove_item(&mut self, product_id: ProductId) -> &Cart { self.dispatch(CartOp::Remove(product_id)) }

    pub fn clear(&mut self) -> &Cart { self.dispatch(CartOp::Clear) }

    /// Drops what `ordered` contained, keeping anything added since.
    pub fn settle(&mut self, ordered: Cart) -> &Cart { self.dispatch(CartOp::Subtract(ordered)) }

    // A failed write keeps the in-memory cart; the next mutation retries the full snapshot.
    fn persist(&self) {
        let result = serde_json::to_string(&self.cart)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.set(CART_KEY, &json));
        if let Err(e) = result {
            error!(error = %e, "Failed to persist cart");
        }
    }
}
