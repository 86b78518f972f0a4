//! Process configuration.
//!
//! Loaded once at startup and shared read-only (`Arc<Settings>`) afterwards.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

use storefront_observability::LogFormat;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    /// Postgres connection string; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    /// How many fresh order numbers a placement tries before giving up.
    pub order_number_attempts: u32,
    pub log_format: LogFormat,
    /// JSON product list loaded into the catalog at startup.
    pub catalog_seed: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            database_max_connections: 5,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            order_number_attempts: 5,
            log_format: LogFormat::Json,
            catalog_seed: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let bind_addr = match lookup("BIND_ADDR") {
            Some(v) => v
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::invalid("BIND_ADDR", e.to_string()))?,
            None => defaults.bind_addr,
        };

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(v) => parse_positive("DATABASE_MAX_CONNECTIONS", &v)?,
            None => defaults.database_max_connections,
        };

        let jwt_secret = match lookup("JWT_SECRET").filter(|v| !v.is_empty()) {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET not set; using insecure dev default");
                defaults.jwt_secret
            }
        };

        let order_number_attempts = match lookup("ORDER_NUMBER_ATTEMPTS") {
            Some(v) => parse_positive("ORDER_NUMBER_ATTEMPTS", &v)?,
            None => defaults.order_number_attempts,
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(v) => v
                .parse::<LogFormat>()
                .map_err(|e| ConfigError::invalid("LOG_FORMAT", e))?,
            None => defaults.log_format,
        };

        let catalog_seed = lookup("CATALOG_SEED")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            bind_addr,
            database_url,
            database_max_connections,
            jwt_secret,
            order_number_attempts,
            log_format,
            catalog_seed,
        })
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n),
        Ok(_) => Err(ConfigError::invalid(key, "must be at least 1")),
        Err(e) => Err(ConfigError::invalid(key, e.to_string())),
    }
}
