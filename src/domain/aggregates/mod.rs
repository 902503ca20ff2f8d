//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{BundleItem, Category, Discount, Product, DEFAULT_STOCK, PLACEHOLDER_IMAGE};
pub use order::{Customer, Delivery, Order, OrderError, OrderItem, OrderStatus};
pub use cart::{Cart, CartError, CartLine, CartOp};
