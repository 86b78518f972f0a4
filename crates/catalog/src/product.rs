use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::{Money, ProductId};

/// A stock decrement that would take the product below zero.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
pub struct StockError {
    pub product_id: ProductId,
    pub requested: i64,
    pub available: i64,
}

/// Product record owned by the catalog.
///
/// # Invariants
/// - `stock_quantity >= 0` at all times (`reserve` refuses to overdraw).
/// - Inactive products (soft-deleted) are not purchasable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    price: Money,
    stock_quantity: i64,
    is_active: bool,
}

impl Product {
    pub fn new(
        id: ProductId,
        name: impl Into<String>,
        price: Money,
        stock_quantity: i64,
        is_active: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            stock_quantity: stock_quantity.max(0),
            is_active,
        }
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock_quantity(&self) -> i64 {
        self.stock_quantity
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Soft-deleted products stay in the catalog but cannot be ordered.
    pub fn is_purchasable(&self) -> bool {
        self.is_active
    }

    pub fn can_fulfil(&self, quantity: i64) -> bool {
        quantity <= self.stock_quantity
    }

    /// Take `quantity` units out of stock.
    pub fn reserve(&mut self, quantity: i64) -> Result<(), StockError> {
        if quantity < 0 || !self.can_fulfil(quantity) {
            return Err(StockError {
                product_id: self.id,
                requested: quantity,
                available: self.stock_quantity,
            });
        }
        self.stock_quantity -= quantity;
        Ok(())
    }
}
