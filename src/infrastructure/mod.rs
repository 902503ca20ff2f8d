//! Adapters for external systems.
pub mod postgres;

pub use postgres::PgStore;
