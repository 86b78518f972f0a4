//! In-memory ledger + catalog for tests/dev.
//!
//! Each product sits behind its own async mutex, so placements only contend on the
//! products they touch. The order table is a plain `RwLock` that is held only for the
//! synchronous part of a commit, never across an `.await`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::instrument;

use storefront_catalog::Product;
use storefront_core::{OrderId, OrderItemId, ProductId, UserId};
use storefront_orders::{NewOrder, Order, OrderNumber, OrderStatus};

use super::{CatalogStore, OrderLedger, PlacementTx, StoreError};

#[derive(Debug, Default)]
struct Ledger {
    /// Insertion order doubles as id order.
    orders: Vec<Order>,
    index: HashMap<OrderId, usize>,
    numbers: HashSet<OrderNumber>,
    last_order_id: i64,
    last_item_id: i64,
}

#[derive(Debug, Default)]
struct Inner {
    products: RwLock<HashMap<ProductId, Arc<Mutex<Product>>>>,
    ledger: RwLock<Ledger>,
}

/// In-memory implementation of [`OrderLedger`] and [`CatalogStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for seeding: build a store holding `products`.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.inner.products.write() {
            for product in products {
                map.insert(product.id(), Arc::new(Mutex::new(product)));
            }
        }
        store
    }

    fn product_handles(&self, ids: &[ProductId]) -> Result<Vec<(ProductId, Arc<Mutex<Product>>)>, StoreError> {
        let map = self
            .inner
            .products
            .read()
            .map_err(|_| StoreError::backend("product table lock poisoned"))?;
        Ok(ids
            .iter()
            .filter_map(|id| map.get(id).map(|handle| (*id, handle.clone())))
            .collect())
    }
}

fn poisoned(_: impl core::fmt::Debug) -> StoreError {
    StoreError::backend("ledger lock poisoned")
}

struct InMemoryPlacement {
    store: InMemoryStore,
    guards: BTreeMap<ProductId, OwnedMutexGuard<Product>>,
}

#[async_trait]
impl PlacementTx for InMemoryPlacement {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let mut wanted: Vec<ProductId> = ids
            .iter()
            .copied()
            .filter(|id| !self.guards.contains_key(id))
            .collect();
        wanted.sort();
        wanted.dedup();

        // Ascending id order, same as `SELECT ... ORDER BY id FOR UPDATE`.
        for (id, handle) in self.store.product_handles(&wanted)? {
            let guard = handle.lock_owned().await;
            self.guards.insert(id, guard);
        }

        Ok(ids
            .iter()
            .filter_map(|id| self.guards.get(id).map(|guard| (**guard).clone()))
            .collect())
    }

    async fn commit(mut self: Box<Self>, order: NewOrder) -> Result<Order, StoreError> {
        let reservations = order.reservations();

        // Check everything before touching anything.
        for (product_id, quantity) in &reservations {
            let guard = self.guards.get(product_id).ok_or_else(|| {
                StoreError::backend(format!("product {product_id} was not locked by this placement"))
            })?;
            if !guard.can_fulfil(*quantity) {
                return Err(StoreError::StockConflict {
                    product_id: *product_id,
                    requested: *quantity,
                });
            }
        }

        let inner = self.store.inner.clone();
        let mut ledger = inner.ledger.write().map_err(poisoned)?;
        if ledger.numbers.contains(order.order_number()) {
            return Err(StoreError::DuplicateOrderNumber(order.order_number().clone()));
        }

        for (product_id, quantity) in &reservations {
            if let Some(guard) = self.guards.get_mut(product_id) {
                guard.reserve(*quantity).map_err(|e| StoreError::StockConflict {
                    product_id: e.product_id,
                    requested: e.requested,
                })?;
            }
        }

        ledger.last_order_id += 1;
        let order_id = OrderId::new(ledger.last_order_id);
        let first_item = ledger.last_item_id + 1;
        ledger.last_item_id += order.items().len() as i64;
        let item_ids = (first_item..=ledger.last_item_id).map(OrderItemId::new);

        let order = order.into_order(order_id, item_ids, Utc::now());
        ledger.numbers.insert(order.order_number.clone());
        let position = ledger.orders.len();
        ledger.index.insert(order_id, position);
        ledger.orders.push(order.clone());

        // Product guards release after the ledger insert, when `self` drops.
        Ok(order)
    }
}

#[async_trait]
impl OrderLedger for InMemoryStore {
    async fn begin_placement(&self) -> Result<Box<dyn PlacementTx>, StoreError> {
        Ok(Box::new(InMemoryPlacement {
            store: self.clone(),
            guards: BTreeMap::new(),
        }))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let ledger = self.inner.ledger.read().map_err(poisoned)?;
        Ok(ledger.index.get(&id).map(|pos| ledger.orders[*pos].clone()))
    }

    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let ledger = self.inner.ledger.read().map_err(poisoned)?;
        Ok(ledger
            .orders
            .iter()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>, StoreError> {
        let ledger = self.inner.ledger.read().map_err(poisoned)?;
        Ok(ledger.orders.clone())
    }

    #[instrument(skip_all, fields(order_id = %id, status = %status))]
    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let mut ledger = self.inner.ledger.write().map_err(poisoned)?;
        let position = *ledger.index.get(&id).ok_or(StoreError::NotFound)?;
        let order = &mut ledger.orders[position];
        order.status = status;
        order.updated_at = Some(at);
        Ok(order.clone())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ledger.read().map(|_| ()).map_err(poisoned)
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let handle = self.product_handles(&[id])?.pop();
        match handle {
            Some((_, handle)) => Ok(Some(handle.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn put_product(&self, product: Product) -> Result<(), StoreError> {
        let existing = self.product_handles(&[product.id()])?.pop();
        match existing {
            Some((_, handle)) => {
                *handle.lock().await = product;
            }
            None => {
                let mut map = self
                    .inner
                    .products
                    .write()
                    .map_err(|_| StoreError::backend("product table lock poisoned"))?;
                map.insert(product.id(), Arc::new(Mutex::new(product)));
            }
        }
        Ok(())
    }
}
