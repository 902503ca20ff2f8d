//! Static delimited-text catalog resource, read from disk or over HTTP.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::instrument;
use crate::catalog::csv;
use crate::catalog::source::{CatalogSource, SourceError};
use crate::domain::aggregates::Product;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextLocation {
    File(PathBuf),
    Url(String),
}

impl TextLocation {
    /// `http://` and `https://` locations are fetched, anything else is a path.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Url(value.to_string())
        } else {
            Self::File(PathBuf::from(value))
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextFormat {
    #[default]
    Products,
    Kits,
}

pub struct StaticCsvSource {
    location: TextLocation,
    format: TextFormat,
    http: reqwest::Client,
}

impl StaticCsvSource {
    pub fn new(location: TextLocation) -> Self {
        Self { location, format: TextFormat::Products, http: reqwest::Client::new() }
    }

    pub fn kits(location: TextLocation) -> Self {
        Self { format: TextFormat::Kits, ..Self::new(location) }
    }

    /// `Ok(None)` when the resource does not exist.
    async fn read(&self) -> Result<Option<String>, SourceError> {
        match &self.location {
            TextLocation::File(path) => match tokio::fs::read_to_string(path).await {
                Ok(text) => Ok(Some(text)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(SourceError::Unavailable(format!("{}: {e}", path.display()))),
            },
            TextLocation::Url(url) => {
                let response = self.http.get(url).send().await
                    .map_err(|e| SourceError::Unavailable(e.to_string()))?;
                match response.status() {
                    StatusCode::NOT_FOUND => Ok(None),
                    status if !status.is_success() => Err(SourceError::Unavailable(format!("{url}: HTTP {status}"))),
                    _ => response.text().await.map(Some).map_err(|e| SourceError::Unavailable(e.to_string())),
                }
            }
        }
    }
}

#[async_trait]
impl CatalogSource for StaticCsvSource {
    fn name(&self) -> &str {
        match self.format { TextFormat::Products => "csv", TextFormat::Kits => "kits-csv" }
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Vec<Product>, SourceError> {
        let Some(text) = self.read().await? else { return Err(SourceError::Empty) };
        let products = match self.format {
            TextFormat::Products => csv::decode(&text)?,
            TextFormat::Kits => csv::decode_kits(&text)?,
        };
        Ok(products)
    }
}
