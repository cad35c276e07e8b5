//! Integration tests for the API server.

use std::sync::OnceLock;
use std::time::Duration;

use api::config::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use storage::InMemoryWarehouse;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

const PASSWORD: &str = "correct horse";

fn test_config() -> Config {
    Config {
        jwt_secret: Some("test-secret".to_string()),
        bcrypt_cost: 4,
        ..Config::default()
    }
}

/// A router plus tokens for one admin and one staff member.
struct TestApp {
    router: axum::Router,
    admin: String,
    staff: String,
}

impl TestApp {
    async fn as_admin(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.router, Some(&self.admin), method, uri, body).await
    }

    async fn as_staff(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.router, Some(&self.staff), method, uri, body).await
    }

    async fn anonymous(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.router, None, method, uri, body).await
    }
}

async fn setup() -> TestApp {
    setup_with(InMemoryWarehouse::new(), test_config()).await
}

async fn setup_with(store: InMemoryWarehouse, config: Config) -> TestApp {
    let state = api::create_state(store, &config);
    let router = api::create_app(state, get_metrics_handle());

    let admin = register_and_login(&router, None, "admin@example.com", "admin").await;
    let staff = register_and_login(&router, None, "staff@example.com", "staff").await;
    TestApp {
        router,
        admin,
        staff,
    }
}

async fn register_and_login(
    router: &axum::Router,
    token: Option<&str>,
    email: &str,
    role: &str,
) -> String {
    let (status, _) = send(
        router,
        token,
        "POST",
        "/api/v1/register",
        Some(json!({ "email": email, "password": PASSWORD, "name": "Tester", "role": role })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, login) = send(
        router,
        None,
        "POST",
        "/api/v1/login",
        Some(json!({ "email": email, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    login["token"].as_str().unwrap().to_string()
}

/// Sends a request and returns the status with the decoded JSON body (`Null` when empty).
async fn send(
    app: &axum::Router,
    token: Option<&str>,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Creates a location and a product with the given stock, returning the product id.
async fn seed_product(app: &TestApp, name: &str, quantity: i64) -> String {
    let (status, location) = app
        .as_admin(
            "POST",
            "/api/v1/locations",
            Some(json!({ "name": format!("{name} shelf"), "capacity": 1000 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, product) = app
        .as_admin(
            "POST",
            "/api/v1/products",
            Some(json!({
                "name": name,
                "sku": format!("SKU-{name}"),
                "quantity": quantity,
                "location_id": location["id"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    product["id"].as_str().unwrap().to_string()
}

async fn stock_of(app: &TestApp, product_id: &str) -> i64 {
    let (status, product) = app
        .as_staff("GET", &format!("/api/v1/products/{product_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    product["quantity"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup().await;

    let (status, json) = app.anonymous("GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

mod orders {
    use super::*;

    #[tokio::test]
    async fn test_receive_order() {
        let app = setup().await;
        let product_id = seed_product(&app, "Widget", 100).await;

        let (status, order) = app
            .as_staff(
                "POST",
                "/api/v1/orders/receive",
                Some(json!({ "product_id": product_id, "quantity": 50 })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["type"], "receiving");
        assert_eq!(order["product_id"], product_id.as_str());
        assert_eq!(order["quantity"], 50);
        assert!(order["id"].as_str().is_some());
        assert!(order["created_at"].as_str().is_some());
        assert_eq!(stock_of(&app, &product_id).await, 150);
    }

    #[tokio::test]
    async fn test_ship_more_than_stock_is_conflict() {
        let app = setup().await;
        let product_id = seed_product(&app, "Widget", 150).await;

        let (status, json) = app
            .as_staff(
                "POST",
                "/api/v1/orders/ship",
                Some(json!({ "product_id": product_id, "quantity": 200 })),
            )
            .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().unwrap().contains("Insufficient stock"));
        assert_eq!(stock_of(&app, &product_id).await, 150);

        let (_, orders) = app.as_staff("GET", "/api/v1/orders", None).await;
        assert_eq!(orders.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_ship_order() {
        let app = setup().await;
        let product_id = seed_product(&app, "Widget", 10).await;

        let (status, order) = app
            .as_staff(
                "POST",
                "/api/v1/orders/ship",
                Some(json!({ "product_id": product_id, "quantity": 4 })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["type"], "shipping");
        assert_eq!(stock_of(&app, &product_id).await, 6);
    }

    #[tokio::test]
    async fn test_receive_beyond_storable_stock_is_conflict() {
        let app = setup().await;
        let product_id = seed_product(&app, "Widget", 1).await;

        let (status, json) = app
            .as_staff(
                "POST",
                "/api/v1/orders/receive",
                Some(json!({ "product_id": product_id, "quantity": i64::MAX })),
            )
            .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().unwrap().contains("Stock overflow"));
        assert_eq!(stock_of(&app, &product_id).await, 1);

        let (_, orders) = app.as_staff("GET", "/api/v1/orders", None).await;
        assert_eq!(orders.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_order_for_unknown_product_is_not_found() {
        let app = setup().await;

        let (status, json) = app
            .as_staff(
                "POST",
                "/api/v1/orders/receive",
                Some(json!({ "product_id": uuid::Uuid::new_v4(), "quantity": 1 })),
            )
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_non_positive_quantity_is_bad_request() {
        let app = setup().await;
        let product_id = seed_product(&app, "Widget", 10).await;

        for quantity in [0, -3] {
            let (status, json) = app
                .as_staff(
                    "POST",
                    "/api/v1/orders/ship",
                    Some(json!({ "product_id": product_id, "quantity": quantity })),
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(json["error"].as_str().unwrap().contains("quantity"));
        }
        assert_eq!(stock_of(&app, &product_id).await, 10);
    }

    #[tokio::test]
    async fn test_malformed_order_body_is_bad_request_with_json_error() {
        let app = setup().await;
        let product_id = seed_product(&app, "Widget", 10).await;

        let bodies = [
            json!({ "product_id": "not-a-uuid", "quantity": 1 }),
            json!({ "product_id": product_id, "quantity": "lots" }),
            json!({ "quantity": 1 }),
        ];
        for body in bodies {
            for uri in ["/api/v1/orders/ship", "/api/v1/orders/receive"] {
                let (status, json) = app.as_staff("POST", uri, Some(body.clone())).await;
                assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {body}");
                assert!(json["error"].as_str().is_some(), "{uri} {body}");
            }
        }
        assert_eq!(stock_of(&app, &product_id).await, 10);
    }

    #[tokio::test]
    async fn test_failed_append_returns_server_error_and_keeps_stock() {
        let store = InMemoryWarehouse::new();
        let app = setup_with(store.clone(), test_config()).await;
        let product_id = seed_product(&app, "Widget", 10).await;

        store.set_fail_on_append(true);
        let (status, json) = app
            .as_staff(
                "POST",
                "/api/v1/orders/receive",
                Some(json!({ "product_id": product_id, "quantity": 5 })),
            )
            .await;
        store.set_fail_on_append(false);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().is_some());
        assert_eq!(stock_of(&app, &product_id).await, 10);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_slow_transaction_times_out() {
        let store = InMemoryWarehouse::new();
        let config = Config {
            request_timeout: Duration::from_millis(50),
            ..test_config()
        };
        let app = setup_with(store.clone(), config).await;
        let product_id = seed_product(&app, "Widget", 10).await;

        store.set_write_delay(Duration::from_millis(500));
        let (status, _) = app
            .as_staff(
                "POST",
                "/api/v1/orders/ship",
                Some(json!({ "product_id": product_id, "quantity": 1 })),
            )
            .await;
        store.set_write_delay(Duration::ZERO);

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(stock_of(&app, &product_id).await, 10);
    }

    #[tokio::test]
    async fn test_get_order_by_id() {
        let app = setup().await;
        let product_id = seed_product(&app, "Widget", 0).await;

        let (_, created) = app
            .as_staff(
                "POST",
                "/api/v1/orders/receive",
                Some(json!({ "product_id": product_id, "quantity": 3 })),
            )
            .await;
        let order_id = created["id"].as_str().unwrap();

        let (status, fetched) = app
            .as_admin("GET", &format!("/api/v1/orders/{order_id}"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_get_nonexistent_order() {
        let app = setup().await;

        let (status, json) = app
            .as_staff(
                "GET",
                &format!("/api/v1/orders/{}", uuid::Uuid::new_v4()),
                None,
            )
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("Order not found"));
    }

    #[tokio::test]
    async fn test_invalid_order_id_format() {
        let app = setup().await;

        let (status, json) = app.as_staff("GET", "/api/v1/orders/not-a-uuid", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("Invalid ID"));
    }

    #[tokio::test]
    async fn test_list_orders_paginated() {
        let app = setup().await;
        let product_id = seed_product(&app, "Widget", 0).await;

        for quantity in 1..=3 {
            let (status, _) = app
                .as_staff(
                    "POST",
                    "/api/v1/orders/receive",
                    Some(json!({ "product_id": product_id, "quantity": quantity })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, page) = app
            .as_staff("GET", "/api/v1/orders?page=2&size=2", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let page = page.as_array().unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["quantity"], 3);

        let (status, all) = app.as_admin("GET", "/api/v1/orders", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 3);

        let (status, _) = app.as_staff("GET", "/api/v1/orders?page=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unparseable_paging_is_bad_request_with_json_error() {
        let app = setup().await;

        for uri in [
            "/api/v1/orders?page=abc",
            "/api/v1/orders?size=-1",
            "/api/v1/products?page=1.5",
            "/api/v1/locations?size=many",
        ] {
            let (status, json) = app.as_admin("GET", uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(json["error"].as_str().is_some(), "{uri}");
        }
    }
}

mod catalog {
    use super::*;

    #[tokio::test]
    async fn test_product_crud() {
        let app = setup().await;
        let product_id = seed_product(&app, "Widget", 7).await;

        let (status, products) = app.as_staff("GET", "/api/v1/products", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(products.as_array().unwrap().len(), 1);

        let (_, location) = app
            .as_admin(
                "POST",
                "/api/v1/locations",
                Some(json!({ "name": "Overflow", "capacity": 10 })),
            )
            .await;

        let (status, updated) = app
            .as_admin(
                "PUT",
                &format!("/api/v1/products/{product_id}"),
                Some(json!({
                    "name": "Widget Pro",
                    "sku": "WID-PRO",
                    "location_id": location["id"],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Widget Pro");
        assert_eq!(updated["quantity"], 7);

        let (status, body) = app
            .as_admin("DELETE", &format!("/api/v1/products/{product_id}"), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, _) = app
            .as_admin("GET", &format!("/api/v1/products/{product_id}"), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_product_body_is_bad_request() {
        let app = setup().await;

        let (status, json) = app
            .as_admin(
                "POST",
                "/api/v1/products",
                Some(json!({
                    "name": "Widget",
                    "sku": "WID-1",
                    "quantity": 1,
                    "location_id": "shelf-7",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_product_is_conflict() {
        let app = setup().await;
        seed_product(&app, "Widget", 1).await;

        let (_, locations) = app.as_staff("GET", "/api/v1/locations", None).await;
        let location_id = locations[0]["id"].clone();

        let (status, json) = app
            .as_admin(
                "POST",
                "/api/v1/products",
                Some(json!({
                    "name": "Widget",
                    "sku": "OTHER",
                    "quantity": 1,
                    "location_id": location_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().unwrap().contains("Name already exists"));
    }

    #[tokio::test]
    async fn test_product_with_orders_cannot_be_deleted() {
        let app = setup().await;
        let product_id = seed_product(&app, "Widget", 5).await;

        let (status, _) = app
            .as_staff(
                "POST",
                "/api/v1/orders/ship",
                Some(json!({ "product_id": product_id, "quantity": 1 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = app
            .as_admin("DELETE", &format!("/api/v1/products/{product_id}"), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_list_locations() {
        let app = setup().await;
        for name in ["Dock", "Aisle 1"] {
            let (status, _) = app
                .as_admin(
                    "POST",
                    "/api/v1/locations",
                    Some(json!({ "name": name, "capacity": 50 })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, locations) = app
            .as_staff("GET", "/api/v1/locations?page=1&size=1", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let locations = locations.as_array().unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0]["name"], "Aisle 1");
    }
}

mod access {
    use super::*;

    #[tokio::test]
    async fn test_protected_routes_require_a_token() {
        let app = setup().await;

        for (method, uri) in [
            ("GET", "/api/v1/orders"),
            ("GET", "/api/v1/products"),
            ("GET", "/api/v1/locations"),
            ("GET", "/api/v1/users/me"),
            ("GET", "/api/v1/users"),
        ] {
            let (status, json) = app.anonymous(method, uri, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert!(json["error"].as_str().is_some());
        }

        let (status, _) = send(&app.router, Some("forged.token.value"), "GET", "/api/v1/orders", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_catalog_writes_are_admin_only() {
        let app = setup().await;
        let product_id = seed_product(&app, "Widget", 5).await;

        let (status, json) = app
            .as_staff(
                "POST",
                "/api/v1/locations",
                Some(json!({ "name": "Back room", "capacity": 5 })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "forbidden");

        let (status, _) = app
            .as_staff("DELETE", &format!("/api/v1/products/{product_id}"), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(stock_of(&app, &product_id).await, 5);
    }

    #[tokio::test]
    async fn test_stock_movements_are_staff_only() {
        let app = setup().await;
        let product_id = seed_product(&app, "Widget", 5).await;

        for uri in ["/api/v1/orders/receive", "/api/v1/orders/ship"] {
            let (status, _) = app
                .as_admin("POST", uri, Some(json!({ "product_id": product_id, "quantity": 1 })))
                .await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        }
        assert_eq!(stock_of(&app, &product_id).await, 5);
    }
}

mod users {
    use super::*;

    #[tokio::test]
    async fn test_me_returns_the_caller_without_password() {
        let app = setup().await;

        let (status, me) = app.as_staff("GET", "/api/v1/users/me", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "staff@example.com");
        assert_eq!(me["role"], "staff");
        assert!(me.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_user_listing_is_admin_only() {
        let app = setup().await;

        let (status, users) = app.as_admin("GET", "/api/v1/users?page=1&size=10", None).await;
        assert_eq!(status, StatusCode::OK);
        let emails: Vec<_> = users
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["email"].as_str().unwrap())
            .collect();
        assert_eq!(emails, ["admin@example.com", "staff@example.com"]);

        let (status, _) = app.as_staff("GET", "/api/v1/users", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_conflict() {
        let app = setup().await;

        let (status, json) = app
            .anonymous(
                "POST",
                "/api/v1/register",
                Some(json!({ "email": "staff@example.com", "password": PASSWORD, "name": "Again" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().unwrap().contains("already registered"));
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let app = setup().await;

        let (status, json) = app
            .anonymous(
                "POST",
                "/api/v1/login",
                Some(json!({ "email": "staff@example.com", "password": "not the password" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(json.get("token").is_none());
    }

    #[tokio::test]
    async fn test_only_admins_can_add_admins() {
        let app = setup().await;

        let (status, _) = app
            .anonymous(
                "POST",
                "/api/v1/register",
                Some(json!({ "email": "boss@example.com", "password": PASSWORD, "name": "Boss", "role": "admin" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .as_staff(
                "POST",
                "/api/v1/register",
                Some(json!({ "email": "boss@example.com", "password": PASSWORD, "name": "Boss", "role": "admin" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let token =
            register_and_login(&app.router, Some(&app.admin), "boss@example.com", "admin").await;
        let (status, _) = send(&app.router, Some(&token), "GET", "/api/v1/users", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup().await;
    let product_id = seed_product(&app, "Widget", 1).await;

    app.as_staff(
        "POST",
        "/api/v1/orders/receive",
        Some(json!({ "product_id": product_id, "quantity": 1 })),
    )
    .await;

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_fulfilled_total"));
}
