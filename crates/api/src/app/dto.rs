use serde::Deserialize;

use storefront_core::ProductId;
use storefront_orders::{CartLine, Order, ShippingInfo};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateOrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<CreateOrderItemRequest>,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal_code: String,
}

impl CreateOrderRequest {
    pub fn into_parts(self) -> (Vec<CartLine>, ShippingInfo) {
        let lines = self
            .items
            .into_iter()
            .map(|item| CartLine::new(ProductId::new(item.product_id), item.quantity))
            .collect();
        let shipping = ShippingInfo {
            address: self.shipping_address,
            city: self.shipping_city,
            postal_code: self.shipping_postal_code,
        };
        (lines, shipping)
    }
}

/// `?status=` on the status update route.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -------------------------
// Response mapping
// -------------------------

pub fn order_to_json(order: &Order) -> serde_json::Value {
    serde_json::json!({
        "id": order.id.get(),
        "order_number": order.order_number.as_str(),
        "user_id": order.user_id.get(),
        "total_amount": order.total_amount,
        "status": order.status.as_str(),
        "shipping_address": order.shipping.address,
        "shipping_city": order.shipping.city,
        "shipping_postal_code": order.shipping.postal_code,
        "created_at": order.created_at.to_rfc3339(),
        "updated_at": order.updated_at.map(|t| t.to_rfc3339()),
        "order_items": order.items.iter().map(|item| serde_json::json!({
            "id": item.id.get(),
            "product_id": item.product_id.get(),
            "quantity": item.quantity,
            "unit_price": item.unit_price,
            "total_price": item.total_price,
        })).collect::<Vec<_>>(),
    })
}

pub fn orders_to_json(orders: &[Order]) -> serde_json::Value {
    serde_json::Value::Array(orders.iter().map(order_to_json).collect())
}
