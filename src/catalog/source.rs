//! Catalog sources and the priority-ordered resolver.
//!
//! Every source exposes the same contract: a product list, or an error. An
//! empty list counts as "nothing here" exactly like an error. The resolver
//! walks its sources strictly in order, one at a time, and always terminates
//! with the built-in catalog.

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use crate::catalog::csv::DecodeError;
use crate::catalog::fallback::FallbackSource;
use crate::domain::aggregates::Product;
use crate::domain::value_objects::ProductId;

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Short label used in logs and in [`ResolvedCatalog::source`].
    fn name(&self) -> &str;
    async fn fetch(&self) -> Result<Vec<Product>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("source returned no products")]
    Empty,
    #[error("malformed catalog text: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Clone, Debug)]
pub struct ResolvedCatalog {
    pub source: String,
    pub products: Vec<Product>,
}

/// A source backed by a list held in memory.
pub struct FixedSource {
    name: String,
    products: Vec<Product>,
}

impl FixedSource {
    pub fn new(name: impl Into<String>, products: Vec<Product>) -> Self {
        Self { name: name.into(), products }
    }
}

#[async_trait]
impl CatalogSource for FixedSource {
    fn name(&self) -> &str { &self.name }

    async fn fetch(&self) -> Result<Vec<Product>, SourceError> {
        Ok(self.products.clone())
    }
}

/// Returns the first source result that is `Ok` and non-empty. Failures and
/// empty results are logged and skipped.
pub async fn first_non_empty(sources: &[Box<dyn CatalogSource>]) -> Option<ResolvedCatalog> {
    for source in sources {
        match source.fetch().await {
            Ok(products) if !products.is_empty() => {
                return Some(ResolvedCatalog { source: source.name().to_string(), products });
            }
            Ok(_) | Err(SourceError::Empty) => debug!(source = source.name(), "Catalog source is empty"),
            Err(e) => warn!(source = source.name(), error = %e, "Catalog source failed"),
        }
    }
    None
}

pub struct CatalogResolver {
    sources: Vec<Box<dyn CatalogSource>>,
    supplements: Vec<Box<dyn CatalogSource>>,
}

impl Default for CatalogResolver {
    fn default() -> Self { Self::new(vec![]) }
}

impl CatalogResolver {
    /// `sources` in priority order; the built-in catalog is appended last.
    pub fn new(mut sources: Vec<Box<dyn CatalogSource>>) -> Self {
        sources.push(Box::new(FallbackSource));
        Self { sources, supplements: vec![] }
    }

    /// Adds a source whose products are appended to whatever catalog resolves,
    /// e.g. a separate kits list. Ids already present are skipped.
    pub fn with_supplement(mut self, source: impl CatalogSource + 'static) -> Self {
        self.supplements.push(Box::new(source));
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Never fails and never yields an empty catalog.
    #[instrument(skip(self))]
    pub async fn resolve(&self) -> ResolvedCatalog {
        let mut resolved = first_non_empty(&self.sources).await.unwrap_or_else(|| ResolvedCatalog {
            source: "builtin".to_string(),
            products: crate::catalog::fallback::builtin_catalog(),
        });
        for supplement in &self.supplements {
            match supplement.fetch().await {
                Ok(extra) => {
                    let known: HashSet<ProductId> = resolved.products.iter().map(|p| p.id.clone()).collect();
                    resolved.products.extend(extra.into_iter().filter(|p| !known.contains(&p.id)));
                }
                Err(e) => debug!(source = supplement.name(), error = %e, "Catalog supplement skipped"),
            }
        }
        info!(source = %resolved.source, products = resolved.products.len(), "Catalog resolved");
        resolved
    }
}
