//! VoltStore storefront core
//!
//! Catalog, cart and checkout engine for an energy-equipment shop
//! (inverters, batteries, solar panels and kits).
//!
//! ## Features
//! - Catalog resolution over an ordered chain of sources with a built-in fallback
//! - Header-driven CSV import and export
//! - Persisted cart with merge and quantity invariants
//! - Checkout validation and single-flight order submission
//! - System sizing recommendations and custom kits
//! - Role-gated product and order administration

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod recommend;
pub mod session;
pub mod storefront;

use thiserror::Error;

pub use storefront::Storefront;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error(transparent)]
    Checkout(#[from] checkout::CheckoutError),

    #[error(transparent)]
    Admin(#[from] admin::AdminError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
