//! Cart validation and pricing.
//!
//! `plan_order` is the pure half of order placement: given the product snapshots read
//! under the placement's locks, it either rejects the cart or produces a priced
//! `NewOrder`. It never touches storage, so a rejection cannot leave partial effects.

use std::collections::HashMap;

use storefront_catalog::Product;
use storefront_core::{Money, ProductId, UserId};

use crate::cart::{CartLine, ShippingInfo};
use crate::error::OrderError;
use crate::order::{NewOrder, NewOrderItem};
use crate::order_number::OrderNumber;

/// Validate `lines` against `products` and price the order.
///
/// Checks run in this order and the first failure wins:
/// 1. the cart is non-empty
/// 2. every product exists and is active
/// 3. stock covers the demand (cumulative when a product appears on several lines)
/// 4. every quantity is positive
pub fn plan_order(
    user_id: UserId,
    lines: &[CartLine],
    shipping: ShippingInfo,
    products: &HashMap<ProductId, Product>,
    order_number: OrderNumber,
) -> Result<NewOrder, OrderError> {
    if lines.is_empty() {
        return Err(OrderError::EmptyCart);
    }

    for line in lines {
        let product = products
            .get(&line.product_id)
            .ok_or(OrderError::ProductNotFound { id: line.product_id })?;
        if !product.is_purchasable() {
            return Err(OrderError::ProductInactive { id: line.product_id });
        }
    }

    let mut demand: HashMap<ProductId, i64> = HashMap::new();
    for line in lines {
        let product = &products[&line.product_id];
        let wanted = demand.entry(line.product_id).or_default();
        *wanted = wanted.saturating_add(line.quantity.max(0));
        if !product.can_fulfil(*wanted) {
            return Err(OrderError::InsufficientStock {
                id: line.product_id,
                requested: *wanted,
                available: product.stock_quantity(),
            });
        }
    }

    if lines.iter().any(|line| line.quantity <= 0) {
        return Err(OrderError::MalformedQuantity);
    }

    let mut total_amount = Money::ZERO;
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let unit_price = products[&line.product_id].price();
        let total_price = unit_price.checked_mul(line.quantity as u64)?;
        total_amount = total_amount.checked_add(total_price)?;
        items.push(NewOrderItem {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price,
            total_price,
        });
    }

    Ok(NewOrder {
        user_id,
        order_number,
        total_amount,
        shipping,
        items,
    })
}
