use std::sync::Arc;

use thiserror::Error;

use storefront_infra::store::{CatalogStore, InMemoryStore, OrderLedger, PostgresStore, StoreError};
use storefront_infra::{seed_catalog, OrderService, SeedError, Settings};

/// Everything the handlers need, shared behind an `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub orders: OrderService,
}

impl AppServices {
    pub fn new(ledger: Arc<dyn OrderLedger>, settings: &Settings) -> Self {
        Self {
            orders: OrderService::new(ledger, settings),
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("order storage unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("catalog seeding failed: {0}")]
    Seed(#[from] SeedError),
}

/// Pick the order ledger from configuration and seed its catalog.
///
/// With `DATABASE_URL` set this connects to Postgres and applies the schema; otherwise
/// the process runs on an in-memory ledger. `CATALOG_SEED` (if set) is loaded into
/// whichever store was chosen.
pub async fn build_services(settings: &Settings) -> Result<AppServices, BootstrapError> {
    match settings.database_url.as_deref() {
        Some(url) => {
            let store = PostgresStore::connect(url, settings.database_max_connections).await?;
            store.migrate().await?;
            tracing::info!(
                max_connections = settings.database_max_connections,
                "using postgres order ledger"
            );
            seed(settings, &store).await?;
            Ok(AppServices::new(Arc::new(store), settings))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory order ledger (nothing is persisted)");
            let store = InMemoryStore::new();
            if settings.catalog_seed.is_none() {
                tracing::warn!("CATALOG_SEED not set; the in-memory catalog is empty");
            }
            seed(settings, &store).await?;
            Ok(AppServices::new(Arc::new(store), settings))
        }
    }
}

async fn seed(settings: &Settings, catalog: &dyn CatalogStore) -> Result<(), SeedError> {
    if let Some(path) = settings.catalog_seed.as_deref() {
        seed_catalog(path, catalog).await?;
    }
    Ok(())
}
