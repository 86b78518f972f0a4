//! Infrastructure layer: configuration, storage adapters, and the order service that
//! composes them.

pub mod config;
pub mod order_service;
pub mod seed;
pub mod store;

pub use config::{ConfigError, Settings};
pub use order_service::OrderService;
pub use seed::{seed_catalog, SeedError};
