//! HTTP API for the storefront workflow.
//!
//! Exposes carts, catalog, discounts, checkout and order history over REST,
//! with structured logging (tracing) and Prometheus metrics. Callers are
//! identified by the `X-User-Id` header set by the upstream proxy.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Persistence;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, create_state, default_gateways, default_shipping};

/// Builds the router with every route and the shared state.
///
/// `expose_internal_errors` replaces the generic body of 500 responses with
/// the underlying message; only development deployments set it.
pub fn create_app<P: Persistence>(
    state: Arc<AppState<P>>,
    metrics_handle: PrometheusHandle,
    expose_internal_errors: bool,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    let app = Router::new()
        .route("/health", get(routes::health::check))
        // Cart
        .route(
            "/cart",
            get(routes::cart::get::<P>).delete(routes::cart::clear::<P>),
        )
        .route("/cart/items", post(routes::cart::add_item::<P>))
        .route(
            "/cart/items/{product_id}",
            put(routes::cart::update_item::<P>).delete(routes::cart::remove_item::<P>),
        )
        .route("/cart/coupon", post(routes::cart::apply_coupon::<P>))
        .route(
            "/cart/discounts",
            axum::routing::delete(routes::cart::clear_discounts::<P>),
        )
        .route(
            "/cart/discounts/auto",
            post(routes::cart::apply_automatic::<P>),
        )
        .route(
            "/cart/discounts/applicable",
            get(routes::cart::applicable_discounts::<P>),
        )
        .route("/checkout", post(routes::checkout::pay::<P>))
        // Orders and payments
        .route("/orders", get(routes::orders::list::<P>))
        .route("/orders/{id}", get(routes::orders::get::<P>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<P>))
        .route("/orders/{id}/discounts", get(routes::orders::discounts::<P>))
        .route("/orders/{id}/payments", get(routes::orders::payments::<P>))
        .route("/payments/{id}", get(routes::payments::get::<P>))
        .route(
            "/payments/{id}/refund",
            post(routes::payments::request_refund::<P>),
        )
        .route(
            "/payments/{id}/refund/complete",
            post(routes::payments::complete_refund::<P>),
        )
        // Catalog
        .route(
            "/products",
            get(routes::products::list::<P>).post(routes::products::create::<P>),
        )
        .route("/products/{id}", get(routes::products::get::<P>))
        .route(
            "/products/{id}/price",
            put(routes::products::update_price::<P>),
        )
        .route(
            "/products/{id}/stock",
            post(routes::products::adjust_stock::<P>),
        )
        .route(
            "/products/{id}/status",
            post(routes::products::change_status::<P>),
        )
        // Discounts
        .route(
            "/discounts",
            get(routes::discounts::list::<P>).post(routes::discounts::create::<P>),
        )
        .route(
            "/discounts/{id}",
            get(routes::discounts::get::<P>).delete(routes::discounts::delete::<P>),
        )
        .route(
            "/discounts/{id}/deactivate",
            post(routes::discounts::deactivate::<P>),
        )
        .route(
            "/shipping/estimate/{postal_code}",
            get(routes::shipping::estimate::<P>),
        )
        .with_state(state)
        .merge(metrics_router);

    let app = if expose_internal_errors {
        app.layer(axum::middleware::from_fn(error::expose_internal_errors))
    } else {
        app
    };

    app.layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
    .layer(TraceLayer::new_for_http())
}
