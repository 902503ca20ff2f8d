//! Catalog resolution: sources, the CSV codec, the built-in list and filtering.
pub mod csv;
pub mod fallback;
pub mod filter;
pub mod source;
pub mod static_text;

pub use csv::DecodeError;
pub use fallback::{builtin_catalog, FallbackSource};
pub use filter::{filter, CategoryFilter};
pub use source::{first_non_empty, CatalogResolver, CatalogSource, FixedSource, ResolvedCatalog, SourceError};
pub use static_text::{StaticCsvSource, TextLocation};
