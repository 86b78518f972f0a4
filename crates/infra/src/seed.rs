//! Catalog seeding from a JSON product list.
//!
//! ```json
//! [
//!   { "id": 1, "name": "Elegant Black Dress", "price": 2699.99, "stock_quantity": 25 },
//!   { "id": 7, "name": "Retired Scarf", "price": 499.0, "stock_quantity": 0, "is_active": false }
//! ]
//! ```
//!
//! Entries are upserted by id, so re-running a seed overwrites price and stock.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use storefront_catalog::Product;
use storefront_core::{Money, ProductId};

use crate::store::{CatalogStore, StoreError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("cannot read catalog seed {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog seed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid catalog seed entry for product {id}: {reason}")]
    Invalid { id: ProductId, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
struct SeedProduct {
    id: ProductId,
    name: String,
    price: Money,
    stock_quantity: i64,
    #[serde(default = "active_by_default")]
    is_active: bool,
}

fn active_by_default() -> bool {
    true
}

/// Parse a seed document into products.
pub fn parse_catalog(json: &str) -> Result<Vec<Product>, SeedError> {
    let entries: Vec<SeedProduct> = serde_json::from_str(json)?;
    entries
        .into_iter()
        .map(|entry| {
            if entry.stock_quantity < 0 {
                return Err(SeedError::Invalid {
                    id: entry.id,
                    reason: format!("stock_quantity must be non-negative, got {}", entry.stock_quantity),
                });
            }
            if entry.name.trim().is_empty() {
                return Err(SeedError::Invalid {
                    id: entry.id,
                    reason: "name must not be empty".into(),
                });
            }
            Ok(Product::new(
                entry.id,
                entry.name,
                entry.price,
                entry.stock_quantity,
                entry.is_active,
            ))
        })
        .collect()
}

/// Read `path` and upsert every product it lists into `catalog`.
///
/// The whole file is validated before anything is written.
pub async fn seed_catalog(path: &Path, catalog: &dyn CatalogStore) -> Result<usize, SeedError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let products = parse_catalog(&json)?;
    let count = products.len();
    for product in products {
        catalog.put_product(product).await?;
    }

    info!(path = %path.display(), products = count, "catalog seeded");
    Ok(count)
}
