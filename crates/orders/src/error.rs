use thiserror::Error;

use storefront_core::{DomainError, ProductId};

/// Failures of the order core.
///
/// Validation variants (`EmptyCart` through `InsufficientStock`) are always detected
/// before any mutation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order must contain at least one item")]
    EmptyCart,

    #[error("quantity must be a positive integer")]
    MalformedQuantity,

    #[error("product with id {id} not found")]
    ProductNotFound { id: ProductId },

    #[error("product with id {id} is not available")]
    ProductInactive { id: ProductId },

    #[error("insufficient stock for product {id}: requested {requested}, available {available}")]
    InsufficientStock {
        id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error("order not found")]
    OrderNotFound,

    #[error("forbidden")]
    Forbidden,

    /// Another order already holds the generated number. Retried by the engine.
    #[error("order number collision")]
    OrderNumberCollision,

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrderError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error comes from the request itself (4xx) rather than the system.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrderError::EmptyCart
                | OrderError::MalformedQuantity
                | OrderError::ProductNotFound { .. }
                | OrderError::ProductInactive { .. }
                | OrderError::InsufficientStock { .. }
        )
    }
}

impl From<DomainError> for OrderError {
    fn from(value: DomainError) -> Self {
        match value {
            // Only quantities multiply prices, so an overflow means an absurd quantity.
            DomainError::AmountOverflow => OrderError::MalformedQuantity,
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => OrderError::Internal(msg),
        }
    }
}
