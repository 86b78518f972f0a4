use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

use storefront_api::app::services::build_services;
use storefront_api::app::{build_app, AppServices};
use storefront_auth::JwtClaims;
use storefront_catalog::Product;
use storefront_core::{Money, ProductId, UserId};
use storefront_infra::store::{CatalogStore, InMemoryStore};
use storefront_infra::Settings;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    store: InMemoryStore,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let store = InMemoryStore::with_products([
            Product::new(ProductId::new(1), "Laptop", Money::from_cents(269_999), 25, true),
            Product::new(ProductId::new(2), "Mouse", Money::from_cents(2_550), 100, true),
            Product::new(ProductId::new(3), "Discontinued", Money::from_cents(999), 10, false),
        ]);

        let settings = Settings {
            jwt_secret: JWT_SECRET.to_string(),
            ..Settings::default()
        };
        let services = AppServices::new(Arc::new(store.clone()), &settings);

        let (base_url, handle) = serve(build_app(&settings, services)).await;

        Self {
            base_url,
            store,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn stock(&self, id: i64) -> i64 {
        self.store
            .get_product(ProductId::new(id))
            .await
            .unwrap()
            .unwrap()
            .stock_quantity()
    }
}

/// Serve `app` (same router as prod) on an ephemeral port.
async fn serve(app: axum::Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind ephemeral port");
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base_url, handle)
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt_at(user_id: i64, is_admin: bool, issued_at: chrono::DateTime<Utc>) -> String {
    let claims = JwtClaims {
        sub: UserId::new(user_id),
        is_admin,
        issued_at,
        expires_at: issued_at + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn mint_jwt(user_id: i64, is_admin: bool) -> String {
    mint_jwt_at(user_id, is_admin, Utc::now())
}

fn order_body(items: serde_json::Value) -> serde_json::Value {
    json!({
        "items": items,
        "shipping_address": "1 Main St",
        "shipping_city": "Springfield",
        "shipping_postal_code": "12345",
    })
}

async fn place(
    client: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    items: serde_json::Value,
) -> reqwest::Response {
    client
        .post(srv.url("/orders"))
        .bearer_auth(token)
        .json(&order_body(items))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(srv.url("/health")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for path in ["/whoami", "/orders", "/orders/1", "/orders/admin/all"] {
        let res = client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
    }

    let res = client
        .get(srv.url("/orders"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn expired_tokens_are_rejected() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt_at(1, false, Utc::now() - ChronoDuration::hours(1));

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn identity_is_derived_from_token() {
    let srv = TestServer::spawn().await;

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(mint_jwt(42, true))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user_id"], 42);
    assert_eq!(body["is_admin"], true);
}

#[tokio::test]
async fn placing_an_order_prices_it_and_reserves_stock() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(7, false);

    let res = place(&client, &srv, &token, json!([{ "product_id": 1, "quantity": 2 }])).await;

    assert_eq!(res.status(), StatusCode::CREATED);
    let order: serde_json::Value = res.json().await.unwrap();
    assert_eq!(order["user_id"], 7);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_amount"].as_f64(), Some(5399.98));
    assert_eq!(order["shipping_city"], "Springfield");
    assert!(order["updated_at"].is_null());

    let number = order["order_number"].as_str().unwrap();
    assert!(number.starts_with("ORD-"), "{number}");
    assert_eq!(number.len(), 12);

    let items = order["order_items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], 1);
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["unit_price"].as_f64(), Some(2699.99));
    assert_eq!(items[0]["total_price"].as_f64(), Some(5399.98));

    assert_eq!(srv.stock(1).await, 23);
}

#[tokio::test]
async fn validation_failures_map_to_client_errors_and_change_nothing() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(7, false);

    let res = place(&client, &srv, &token, json!([{ "product_id": 1, "quantity": 30 }])).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["product_id"], 1);
    assert_eq!(body["requested"], 30);
    assert_eq!(body["available"], 25);

    let res = place(&client, &srv, &token, json!([])).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "empty_cart");

    let res = place(&client, &srv, &token, json!([{ "product_id": 1, "quantity": 0 }])).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "malformed_quantity");

    let res = place(
        &client,
        &srv,
        &token,
        json!([{ "product_id": 1, "quantity": 1 }, { "product_id": 99, "quantity": 1 }]),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "product_not_found");
    assert_eq!(body["product_id"], 99);

    let res = place(&client, &srv, &token, json!([{ "product_id": 3, "quantity": 1 }])).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "product_inactive");

    assert_eq!(srv.stock(1).await, 25);
    assert_eq!(srv.stock(3).await, 10);

    let res = client
        .get(srv.url("/orders"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let mine: serde_json::Value = res.json().await.unwrap();
    assert_eq!(mine.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn orders_are_visible_to_owner_and_admin_only() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = mint_jwt(7, false);
    let stranger = mint_jwt(8, false);
    let admin = mint_jwt(1, true);

    let res = place(&client, &srv, &owner, json!([{ "product_id": 2, "quantity": 1 }])).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let path = format!("/orders/{}", created["id"]);

    for (token, expected) in [
        (&owner, StatusCode::OK),
        (&admin, StatusCode::OK),
        (&stranger, StatusCode::NOT_FOUND),
    ] {
        let res = client
            .get(srv.url(&path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), expected);
    }

    let res = client
        .get(srv.url("/orders"))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    let theirs: serde_json::Value = res.json().await.unwrap();
    assert!(theirs.as_array().unwrap().is_empty());

    let res = client
        .get(srv.url("/orders/not-a-number"))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn admin_listing_requires_admin() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let alice = mint_jwt(7, false);
    let bob = mint_jwt(8, false);

    place(&client, &srv, &alice, json!([{ "product_id": 2, "quantity": 1 }])).await;
    place(&client, &srv, &bob, json!([{ "product_id": 2, "quantity": 2 }])).await;

    let res = client
        .get(srv.url("/orders/admin/all"))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");

    let res = client
        .get(srv.url("/orders/admin/all"))
        .bearer_auth(mint_jwt(1, true))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let all: serde_json::Value = res.json().await.unwrap();
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn status_updates_via_query_or_body() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let customer = mint_jwt(7, false);
    let admin = mint_jwt(1, true);

    let res = place(&client, &srv, &customer, json!([{ "product_id": 1, "quantity": 1 }])).await;
    let created: serde_json::Value = res.json().await.unwrap();
    let path = format!("/orders/{}/status", created["id"]);

    let res = client
        .put(srv.url(&format!("{path}?status=shipped")))
        .bearer_auth(&customer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .put(srv.url(&format!("{path}?status=shipped")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["order"]["status"], "shipped");
    assert!(body["message"].as_str().unwrap().contains("shipped"));
    assert!(!body["order"]["updated_at"].is_null());

    // Any status may follow any other.
    let res = client
        .put(srv.url(&path))
        .bearer_auth(&admin)
        .json(&json!({ "status": "pending" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["order"]["status"], "pending");
    assert_eq!(body["order"]["total_amount"], created["total_amount"]);

    let res = client
        .put(srv.url(&format!("{path}?status=lost")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_status");

    let res = client
        .put(srv.url("/orders/9999/status?status=shipped"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Stock is untouched by status changes.
    assert_eq!(srv.stock(1).await, 24);
}

#[tokio::test]
async fn non_admins_are_refused_before_status_is_parsed() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let customer = mint_jwt(7, false);

    let res = place(&client, &srv, &customer, json!([{ "product_id": 1, "quantity": 1 }])).await;
    let created: serde_json::Value = res.json().await.unwrap();

    for path in [
        format!("/orders/{}/status?status=lost", created["id"]),
        "/orders/not-a-number/status?status=shipped".to_string(),
        format!("/orders/{}/status", created["id"]),
    ] {
        let res = client
            .put(srv.url(&path))
            .bearer_auth(&customer)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{path}");
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "forbidden");
    }
}

#[tokio::test]
async fn cors_preflight_is_answered_without_a_token() {
    let srv = TestServer::spawn().await;

    let res = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, srv.url("/orders"))
        .header("Origin", "http://shop.example")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "authorization, content-type")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://shop.example")
    );
}

#[tokio::test]
async fn seeded_in_memory_server_accepts_orders() {
    let settings = Settings {
        jwt_secret: JWT_SECRET.to_string(),
        catalog_seed: Some(concat!(env!("CARGO_MANIFEST_DIR"), "/seed/catalog.json").into()),
        ..Settings::default()
    };
    let services = build_services(&settings).await.expect("seeded services");
    let (base_url, handle) = serve(build_app(&settings, services)).await;

    let res = reqwest::Client::new()
        .post(format!("{base_url}/orders"))
        .bearer_auth(mint_jwt(1, false))
        .json(&order_body(json!([{ "product_id": 1, "quantity": 1 }])))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    let order: serde_json::Value = res.json().await.unwrap();
    assert_eq!(order["total_amount"].as_f64(), Some(2699.99));
    assert_eq!(order["order_items"][0]["product_id"], 1);
    handle.abort();
}

