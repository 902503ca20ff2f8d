//! Configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `DATABASE_URL` - `PostgreSQL` connection string. Without it the remote
//!   catalog is skipped and orders and product edits stay in memory.
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `CATALOG_CSV` - Path or URL of the static catalog (default: public/products.csv)
//! - `KITS_CSV` - Path or URL of an extra kits list
//! - `STORAGE_DIR` - Directory for cart and session storage (default: .voltstore)
//! - `ORDER_PREFIX` - Order number prefix (default: ORD-)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;
use crate::catalog::TextLocation;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub catalog_csv: TextLocation,
    pub kits_csv: Option<TextLocation>,
    pub storage_dir: PathBuf,
    pub order_prefix: String,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let host = parse("HOST", &or_default("HOST", "0.0.0.0"))?;
        let port = parse("PORT", &or_default("PORT", "8083"))?;
        let database_max_connections = parse("DATABASE_MAX_CONNECTIONS", &or_default("DATABASE_MAX_CONNECTIONS", "10"))?;
        let order_prefix = or_default("ORDER_PREFIX", "ORD-");
        if order_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidEnvVar("ORDER_PREFIX".into(), "must not contain whitespace".into()));
        }

        Ok(Self {
            host,
            port,
            database_url: get("DATABASE_URL"),
            database_max_connections,
            catalog_csv: TextLocation::parse(&or_default("CATALOG_CSV", "public/products.csv")),
            kits_csv: get("KITS_CSV").map(|v| TextLocation::parse(&v)),
            storage_dir: PathBuf::from(or_default("STORAGE_DIR", ".voltstore")),
            order_prefix,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_vars(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.socket_addr().to_string(), "0.0.0.0:8083");
        assert_eq!(c.database_url, None);
        assert_eq!(c.catalog_csv, TextLocation::File("public/products.csv".into()));
        assert_eq!(c.kits_csv, None);
        assert_eq!(c.order_prefix, "ORD-");
    }

    #[test]
    fn test_overrides() {
        let c = config(&[("PORT", "9000"), ("CATALOG_CSV", "https://cdn/p.csv"), ("DATABASE_URL", " ")]).unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.catalog_csv, TextLocation::Url("https://cdn/p.csv".into()));
        assert_eq!(c.database_url, None);
    }

    #[test]
    fn test_invalid_port_names_variable() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "PORT"));
    }
}
