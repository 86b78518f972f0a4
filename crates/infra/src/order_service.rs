//! Order placement engine and order query/status service.
//!
//! ## Placement flow
//!
//! ```text
//! cart
//!   ↓
//! 1. Open a placement on the ledger
//!   ↓
//! 2. Lock the referenced products (ascending id order)
//!   ↓
//! 3. Validate + price against the locked snapshots (pure, `plan_order`)
//!   ↓
//! 4. Commit order + items + stock decrements as one unit
//! ```
//!
//! Any failure before step 4 completes drops the placement, which rolls it back. A
//! clash on the order number restarts the whole flow with a fresh number, a bounded
//! number of times.
//!
//! This module contains no IO itself; it composes the storage traits.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use storefront_auth::{require_admin, Identity};
use storefront_core::{OrderId, ProductId, UserId};
use storefront_orders::{
    plan_order, CartLine, Order, OrderError, OrderNumberGenerator, OrderStatus, RandomOrderNumbers,
    ShippingInfo,
};

use crate::config::Settings;
use crate::store::{OrderLedger, StoreError};

impl From<StoreError> for OrderError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => OrderError::OrderNotFound,
            StoreError::DuplicateOrderNumber(_) => OrderError::OrderNumberCollision,
            other => OrderError::internal(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct OrderService {
    ledger: Arc<dyn OrderLedger>,
    numbers: Arc<dyn OrderNumberGenerator>,
    max_attempts: u32,
}

impl OrderService {
    pub fn new(ledger: Arc<dyn OrderLedger>, settings: &Settings) -> Self {
        Self {
            ledger,
            numbers: Arc::new(RandomOrderNumbers),
            max_attempts: settings.order_number_attempts.max(1),
        }
    }

    pub fn with_number_generator(mut self, numbers: Arc<dyn OrderNumberGenerator>) -> Self {
        self.numbers = numbers;
        self
    }

    /// Validate, price and atomically commit an order for `user_id`.
    ///
    /// On error the catalog and the ledger are exactly as before the call.
    #[instrument(skip_all, fields(user_id = %user_id, line_count = lines.len()))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        lines: &[CartLine],
        shipping: ShippingInfo,
    ) -> Result<Order, OrderError> {
        if lines.is_empty() {
            warn!("order rejected: empty cart");
            return Err(OrderError::EmptyCart);
        }

        let product_ids: Vec<ProductId> = lines.iter().map(|line| line.product_id).collect();

        for attempt in 1..=self.max_attempts {
            let mut placement = self.ledger.begin_placement().await.map_err(|e| {
                error!(error = %e, "could not open placement");
                OrderError::from(e)
            })?;

            let products: HashMap<ProductId, _> = placement
                .lock_products(&product_ids)
                .await
                .map_err(|e| {
                    error!(error = %e, "could not lock products");
                    OrderError::from(e)
                })?
                .into_iter()
                .map(|product| (product.id(), product))
                .collect();

            let order_number = self.numbers.next_number();
            let new_order = match plan_order(user_id, lines, shipping.clone(), &products, order_number) {
                Ok(new_order) => new_order,
                Err(e) => {
                    warn!(error = %e, "order rejected");
                    return Err(e);
                }
            };

            match placement.commit(new_order).await {
                Ok(order) => {
                    info!(
                        order_id = %order.id,
                        order_number = %order.order_number,
                        total_amount = %order.total_amount,
                        "order placed"
                    );
                    return Ok(order);
                }
                Err(StoreError::DuplicateOrderNumber(number)) => {
                    warn!(attempt, order_number = %number, "order number collision; retrying");
                }
                Err(e) => {
                    error!(error = %e, "order commit failed; rolled back");
                    return Err(OrderError::internal(e.to_string()));
                }
            }
        }

        error!(attempts = self.max_attempts, "could not allocate a unique order number");
        Err(OrderError::internal(format!(
            "could not allocate a unique order number after {} attempts",
            self.max_attempts
        )))
    }

    /// The order, if `requester` owns it or is an administrator.
    ///
    /// Anyone else gets `OrderNotFound`, so existence is not revealed.
    pub async fn get_order(&self, id: OrderId, requester: &Identity) -> Result<Order, OrderError> {
        let order = self.ledger.get_order(id).await?.ok_or(OrderError::OrderNotFound)?;
        if !order.is_visible_to(requester.user_id, requester.is_admin) {
            return Err(OrderError::OrderNotFound);
        }
        Ok(order)
    }

    pub async fn list_my_orders(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.ledger.list_orders_by_user(user_id).await?)
    }

    pub async fn list_all_orders(&self, requester: &Identity) -> Result<Vec<Order>, OrderError> {
        require_admin(requester).map_err(|_| OrderError::Forbidden)?;
        Ok(self.ledger.list_all_orders().await?)
    }

    /// Set an order's status. Administrators only; any status may follow any other.
    #[instrument(skip_all, fields(order_id = %id, status = %status, by = %requester.user_id))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        requester: &Identity,
    ) -> Result<Order, OrderError> {
        require_admin(requester).map_err(|_| OrderError::Forbidden)?;

        let current = self.ledger.get_order(id).await?.ok_or(OrderError::OrderNotFound)?;
        if current.status != status && !current.status.can_transition_to(status) {
            warn!(from = %current.status, to = %status, "status change leaves the usual fulfilment path");
        }

        let order = self.ledger.update_status(id, status, Utc::now()).await?;
        info!(order_number = %order.order_number, "order status updated");
        Ok(order)
    }

    pub async fn health(&self) -> Result<(), OrderError> {
        Ok(self.ledger.ping().await?)
    }
}
