use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use storefront_orders::OrderError;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_my_orders))
        .route("/admin/all", get(list_all_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_order_status))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let (lines, shipping) = body.into_parts();

    match services
        .orders
        .place_order(caller.user_id(), &lines, shipping)
        .await
    {
        Ok(order) => (StatusCode::CREATED, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}

pub async fn list_my_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
) -> axum::response::Response {
    match services.orders.list_my_orders(caller.user_id()).await {
        Ok(orders) => Json(dto::orders_to_json(&orders)).into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}

pub async fn list_all_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
) -> axum::response::Response {
    match services.orders.list_all_orders(caller.identity()).await {
        Ok(orders) => Json(dto::orders_to_json(&orders)).into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match errors::parse_order_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.orders.get_order(order_id, caller.identity()).await {
        Ok(order) => Json(dto::order_to_json(&order)).into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}

/// `PUT /orders/:id/status`, taking the status from `?status=` or a `{"status": ..}` body.
pub async fn update_order_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::StatusQuery>,
    body: Option<Json<dto::UpdateStatusRequest>>,
) -> axum::response::Response {
    // Non-admins are refused before their input is looked at.
    if !caller.is_admin() {
        return errors::order_error_to_response(OrderError::Forbidden);
    }

    let order_id = match errors::parse_order_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let raw = match (query.status, body) {
        (Some(status), _) => status,
        (None, Some(Json(body))) => body.status,
        (None, None) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_status",
                "status is required (query parameter or JSON body)",
            );
        }
    };
    let status = match errors::parse_order_status(&raw) {
        Ok(status) => status,
        Err(resp) => return resp,
    };

    match services
        .orders
        .update_status(order_id, status, caller.identity())
        .await
    {
        Ok(order) => Json(serde_json::json!({
            "message": format!("order status updated to {status}"),
            "order": dto::order_to_json(&order),
        }))
        .into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}
