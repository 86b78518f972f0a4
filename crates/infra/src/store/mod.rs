//! Order ledger + catalog storage abstractions.
//!
//! The placement transaction is modelled as a handle (`PlacementTx`) so the engine can
//! run validation and pricing between "lock the products" and "commit", while the
//! adapter guarantees that the commit (order row, item rows, stock decrements) is one
//! atomic unit. Dropping a handle without committing rolls everything back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use storefront_catalog::Product;
use storefront_core::{OrderId, ProductId, UserId};
use storefront_orders::{NewOrder, Order, OrderNumber, OrderStatus};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Storage-level failures.
///
/// ## Error Categories
///
/// - `DuplicateOrderNumber`: uniqueness backstop on `order_number`; the caller may retry
///   with a fresh number.
/// - `StockConflict`: the conditional decrement found less stock than the commit needed.
///   Should not happen while products stay locked; treated as an internal failure.
/// - `NotFound`: the addressed order does not exist.
/// - `Backend`: anything else (connection, serialization, poisoned locks).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("order number {0} already exists")]
    DuplicateOrderNumber(OrderNumber),

    #[error("stock for product {product_id} cannot cover {requested} units")]
    StockConflict { product_id: ProductId, requested: i64 },

    #[error("not found")]
    NotFound,

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// One in-flight order placement.
#[async_trait]
pub trait PlacementTx: Send {
    /// Lock the given products for the rest of the placement and return their current
    /// state. Unknown ids are simply absent from the result.
    ///
    /// Locks are taken in ascending id order, so concurrent placements cannot deadlock.
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    /// Atomically persist the order with its items and take its stock reservations.
    async fn commit(self: Box<Self>, order: NewOrder) -> Result<Order, StoreError>;
}

/// Authoritative store of orders. The only writer of order state.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn begin_placement(&self) -> Result<Box<dyn PlacementTx>, StoreError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// All orders placed by `user_id`, oldest first.
    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError>;

    /// Every order, oldest first.
    async fn list_all_orders(&self) -> Result<Vec<Order>, StoreError>;

    /// Overwrite the status (no transition rules here). `NotFound` when absent.
    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Order, StoreError>;

    /// Liveness check for `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Read access to catalog products outside a placement.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Insert or replace a product record.
    async fn put_product(&self, product: Product) -> Result<(), StoreError>;
}
