use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Money, OrderId, OrderItemId, ProductId, UserId};

use crate::cart::ShippingInfo;
use crate::order_number::OrderNumber;

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// The nominal fulfilment path.
    ///
    /// Status updates are not rejected when they leave this path; callers use it to flag
    /// unusual transitions.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Shipped)
                | (Confirmed, Cancelled)
                | (Shipped, Delivered)
        )
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "status must be one of: pending, confirmed, shipped, delivered, cancelled (got {s:?})"
                )
            })
    }
}

/// A committed order line. `unit_price` is the product price at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
}

/// A committed order with its items.
///
/// Everything except `status` and `updated_at` is immutable once the ledger has
/// assigned an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub shipping: ShippingInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn is_visible_to(&self, user_id: UserId, is_admin: bool) -> bool {
        is_admin || self.user_id == user_id
    }
}

/// A priced line of an order that has not been committed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub(crate) product_id: ProductId,
    pub(crate) quantity: i64,
    pub(crate) unit_price: Money,
    pub(crate) total_price: Money,
}

impl NewOrderItem {
    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }
}

/// A validated, priced order ready for the ledger.
///
/// Only `plan_order` builds one, so `total_amount == Σ items.total_price` and
/// `total_price == quantity * unit_price` hold by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub(crate) user_id: UserId,
    pub(crate) order_number: OrderNumber,
    pub(crate) total_amount: Money,
    pub(crate) shipping: ShippingInfo,
    pub(crate) items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn shipping(&self) -> &ShippingInfo {
        &self.shipping
    }

    pub fn items(&self) -> &[NewOrderItem] {
        &self.items
    }

    /// Stock to take per product, merged across lines, in ascending product id order.
    pub fn reservations(&self) -> Vec<(ProductId, i64)> {
        let mut merged: BTreeMap<ProductId, i64> = BTreeMap::new();
        for item in &self.items {
            *merged.entry(item.product_id).or_default() += item.quantity;
        }
        merged.into_iter().collect()
    }

    /// Attach storage-assigned identity and timestamps.
    pub fn into_order(
        self,
        id: OrderId,
        item_ids: impl IntoIterator<Item = OrderItemId>,
        created_at: DateTime<Utc>,
    ) -> Order {
        let items = self
            .items
            .into_iter()
            .zip(item_ids)
            .map(|(item, item_id)| OrderItem {
                id: item_id,
                order_id: id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price: item.total_price,
            })
            .collect();

        Order {
            id,
            order_number: self.order_number,
            user_id: self.user_id,
            total_amount: self.total_amount,
            status: OrderStatus::Pending,
            shipping: self.shipping,
            created_at,
            updated_at: None,
            items,
        }
    }
}
