use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use storefront_core::OrderId;
use storefront_orders::{OrderError, OrderStatus};

pub fn order_error_to_response(err: OrderError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        OrderError::EmptyCart => json_error(StatusCode::BAD_REQUEST, "empty_cart", message),
        OrderError::MalformedQuantity => {
            json_error(StatusCode::BAD_REQUEST, "malformed_quantity", message)
        }
        OrderError::ProductNotFound { id } => json_error_with(
            StatusCode::NOT_FOUND,
            "product_not_found",
            message,
            json!({ "product_id": id.get() }),
        ),
        OrderError::ProductInactive { id } => json_error_with(
            StatusCode::NOT_FOUND,
            "product_inactive",
            message,
            json!({ "product_id": id.get() }),
        ),
        OrderError::InsufficientStock {
            id,
            requested,
            available,
        } => json_error_with(
            StatusCode::BAD_REQUEST,
            "insufficient_stock",
            message,
            json!({
                "product_id": id.get(),
                "requested": requested,
                "available": available,
            }),
        ),
        OrderError::OrderNotFound => json_error(StatusCode::NOT_FOUND, "not_found", message),
        OrderError::Forbidden => {
            json_error(StatusCode::FORBIDDEN, "forbidden", "administrator access required")
        }
        OrderError::OrderNumberCollision | OrderError::Internal(_) => {
            // Details stay in the logs.
            tracing::error!(error = %message, "request failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal server error",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    json_error_with(status, code, message, json!({}))
}

/// Like [`json_error`], with extra context fields merged into the body.
pub fn json_error_with(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    context: serde_json::Value,
) -> axum::response::Response {
    let mut body = json!({
        "error": code,
        "message": message.into(),
    });
    if let (Some(body), serde_json::Value::Object(extra)) = (body.as_object_mut(), context) {
        body.extend(extra);
    }

    (status, axum::Json(body)).into_response()
}

pub fn parse_order_id(s: &str) -> Result<OrderId, axum::response::Response> {
    s.parse::<OrderId>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

pub fn parse_order_status(s: &str) -> Result<OrderStatus, axum::response::Response> {
    s.parse::<OrderStatus>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_status", e))
}
