use serde::{Deserialize, Serialize};

use storefront_core::ProductId;

/// A `(product_id, quantity)` pair submitted for purchase.
///
/// `quantity` is signed on purpose: malformed requests (zero or negative) must reach
/// validation so they can be rejected as a whole.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl CartLine {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Shipping destination, snapshotted onto the order at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub address: String,
    pub city: String,
    pub postal_code: String,
}
