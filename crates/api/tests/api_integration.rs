//! Integration tests for the API server.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::config::Config;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::Money;
use domain::{NewProduct, Product};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use services::{FlatRateTable, PostalAddress, PostalLookup, ShippingEstimator};
use store::InMemoryBackend;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

/// Knows a single CEP in São Paulo.
struct PaulistaOnly;

#[async_trait]
impl PostalLookup for PaulistaOnly {
    async fn lookup(
        &self,
        postal_code: &str,
        _cancel: &CancellationToken,
    ) -> services::Result<Option<PostalAddress>> {
        Ok((postal_code == "01310100").then(|| PostalAddress {
            postal_code: "01310-100".to_string(),
            street: "Avenida Paulista".to_string(),
            district: "Bela Vista".to_string(),
            city: "São Paulo".to_string(),
            state: "SP".to_string(),
        }))
    }
}

fn brl(amount: &str) -> Money {
    Money::parse("BRL", amount).unwrap()
}

fn setup_with(expose_internal_errors: bool) -> (axum::Router, InMemoryBackend) {
    let config = Config {
        payment_processing_delay: Duration::ZERO,
        payment_rng_seed: Some(7),
        ..Config::default()
    };
    let backend = InMemoryBackend::new();
    let shipping = ShippingEstimator::new(
        Arc::new(PaulistaOnly),
        FlatRateTable::new(brl("39.90")).with_rate("SP", brl("14.90")),
    );
    let state = api::create_state(
        backend.clone(),
        &config,
        api::default_gateways(&config),
        shipping,
    );
    let app = api::create_app(state, get_metrics_handle(), expose_internal_errors);
    (app, backend)
}

fn setup() -> (axum::Router, InMemoryBackend) {
    setup_with(false)
}

async fn seed_product(backend: &InMemoryBackend, price: &str, stock: u32) -> Product {
    let product = Product::create(NewProduct {
        name: "Caneca".to_string(),
        description: "Caneca de cerâmica".to_string(),
        price: brl(price),
        stock,
        image_url: None,
        categories: BTreeSet::new(),
    })
    .unwrap();
    backend.seed_product(&product).await;
    product
}

fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn address() -> Value {
    json!({
        "street": "Avenida Paulista",
        "number": "1578",
        "complement": null,
        "district": "Bela Vista",
        "city": "São Paulo",
        "state": "SP",
        "postal_code": "01310-200",
        "country": "BR"
    })
}

fn pix_checkout() -> Value {
    json!({
        "method": "Pix",
        "details": { "type": "Pix" },
        "shipping_address": address(),
        "billing_address": address(),
    })
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, body) = send(&app, request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint_is_plain_text() {
    let (app, _) = setup();

    let response = app
        .oneshot(request("GET", "/metrics", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_cart_requires_user_header() {
    let (app, _) = setup();

    let (status, body) = send(&app, request("GET", "/cart", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("X-User-Id"));
}

#[tokio::test]
async fn test_get_cart_creates_an_empty_cart() {
    let (app, _) = setup();

    let (status, body) = send(&app, request("GET", "/cart", Some("ana"), None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "ana");
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
    assert_eq!(body["total_quantity"], 0);
}

#[tokio::test]
async fn test_add_item_with_zero_quantity_is_a_validation_error() {
    let (app, backend) = setup();
    let product = seed_product(&backend, "25.00", 5).await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/cart/items",
            Some("ana"),
            Some(json!({ "product_id": product.id(), "quantity": 0 })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["Quantity"].is_array());
}

#[tokio::test]
async fn test_add_more_than_stock_is_rejected() {
    let (app, backend) = setup();
    let product = seed_product(&backend, "25.00", 2).await;

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/cart/items",
            Some("ana"),
            Some(json!({ "product_id": product.id(), "quantity": 3 })),
        ),
    )
    .await;

    assert!(status.is_client_error());
    let (_, cart) = send(&app, request("GET", "/cart", Some("ana"), None)).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_unknown_product_returns_404() {
    let (app, _) = setup();

    let uri = format!("/products/{}", common::ProductId::new());
    let (status, _) = send(&app, request("GET", &uri, None, None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_page_size_is_a_validation_error() {
    let (app, _) = setup();

    let (status, body) = send(
        &app,
        request("GET", "/products?page=1&page_size=500", None, None),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["PageSize"].is_array());
}

#[tokio::test]
async fn test_checkout_places_order_and_decrements_stock() {
    let (app, backend) = setup();
    let product = seed_product(&backend, "50.00", 5).await;

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/cart/items",
            Some("ana"),
            Some(json!({ "product_id": product.id(), "quantity": 2 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, receipt) = send(
        &app,
        request("POST", "/checkout", Some("ana"), Some(pix_checkout())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["status"], "Succeeded");
    let order_id = receipt["order_id"].as_str().unwrap().to_string();

    let (status, order) = send(
        &app,
        request("GET", &format!("/orders/{order_id}"), Some("ana"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "Created");
    assert_eq!(order["items"].as_array().unwrap().len(), 1);

    let (_, stored) = send(
        &app,
        request("GET", &format!("/products/{}", product.id()), None, None),
    )
    .await;
    assert_eq!(stored["stock"], 3);

    let (_, cart) = send(&app, request("GET", "/cart", Some("ana"), None)).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);

    let (status, payments) = send(
        &app,
        request(
            "GET",
            &format!("/orders/{order_id}/payments"),
            Some("ana"),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payments.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_orders_of_other_users_are_not_visible() {
    let (app, backend) = setup();
    let product = seed_product(&backend, "10.00", 5).await;
    send(
        &app,
        request(
            "POST",
            "/cart/items",
            Some("ana"),
            Some(json!({ "product_id": product.id(), "quantity": 1 })),
        ),
    )
    .await;
    let (_, receipt) = send(
        &app,
        request("POST", "/checkout", Some("ana"), Some(pix_checkout())),
    )
    .await;
    let order_id = receipt["order_id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        request("GET", &format!("/orders/{order_id}"), Some("bruno"), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_checkout_of_empty_cart_is_rejected() {
    let (app, _) = setup();
    send(&app, request("GET", "/cart", Some("ana"), None)).await;

    let (status, body) = send(
        &app,
        request("POST", "/checkout", Some("ana"), Some(pix_checkout())),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["Cart"].is_array());
}

#[tokio::test]
async fn test_unexpected_errors_hide_their_message() {
    let (app, backend) = setup();
    let product = seed_product(&backend, "10.00", 5).await;
    backend.fail_product_lookup(product.id());

    let (status, body) = send(
        &app,
        request("GET", &format!("/products/{}", product.id()), None, None),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], api::error::GENERIC_ERROR_MESSAGE);
}

#[tokio::test]
async fn test_development_mode_exposes_unexpected_errors() {
    let (app, backend) = setup_with(true);
    let product = seed_product(&backend, "10.00", 5).await;
    backend.fail_product_lookup(product.id());

    let (status, body) = send(
        &app,
        request("GET", &format!("/products/{}", product.id()), None, None),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("injected failure: product lookup")
    );
}

#[tokio::test]
async fn test_discount_admin_and_coupon_flow() {
    let (app, backend) = setup();
    let product = seed_product(&backend, "100.00", 5).await;

    let (status, discount) = send(
        &app,
        request(
            "POST",
            "/discounts",
            None,
            Some(json!({
                "code": "BEMVINDO",
                "discount_type": "Percentage",
                "fixed_amount": null,
                "percentage": "10",
                "max_uses": 100,
                "min_order_amount": { "currency": "BRL", "amount": "0" },
                "max_uses_per_user": 1,
                "valid_from": "2020-01-01T00:00:00Z",
                "valid_to": "2099-01-01T00:00:00Z",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let discount_id = discount["id"].as_str().unwrap().to_string();

    send(
        &app,
        request(
            "POST",
            "/cart/items",
            Some("ana"),
            Some(json!({ "product_id": product.id(), "quantity": 1 })),
        ),
    )
    .await;
    let (status, cart) = send(
        &app,
        request(
            "POST",
            "/cart/coupon",
            Some("ana"),
            Some(json!({ "code": "BEMVINDO" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["applied_discounts"].as_array().unwrap().len(), 1);

    let (status, receipt) = send(
        &app,
        request("POST", "/checkout", Some("ana"), Some(pix_checkout())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = receipt["order_id"].as_str().unwrap();

    let (status, history) = send(
        &app,
        request(
            "GET",
            &format!("/orders/{order_id}/discounts"),
            Some("ana"),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);

    // A used discount can no longer be deleted.
    let (status, _) = send(
        &app,
        request("DELETE", &format!("/discounts/{discount_id}"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_shipping_estimate_uses_state_rate() {
    let (app, _) = setup();

    let (status, body) = send(
        &app,
        request("GET", "/shipping/estimate/01310-100", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["destination"]["state"], "SP");

    let (status, _) = send(
        &app,
        request("GET", "/shipping/estimate/99999-999", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, request("GET", "/shipping/estimate/123", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
