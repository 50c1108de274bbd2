//! Shared application state.

use std::sync::Arc;

use common::Money;
use payments::{GatewayConfig, PaymentStrategyFactory, ReferenceGenerator};
use rust_decimal::Decimal;
use services::{
    CartService, CheckoutSettings, DiscountService, FlatRateTable, HttpPostalLookup,
    OrderService, PaymentService, ProductService, ShippingEstimator, TracingNotifier,
};
use store::Persistence;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Services shared by all handlers.
pub struct AppState<P: Persistence> {
    pub carts: CartService<P>,
    pub products: ProductService<P>,
    pub discounts: DiscountService<P>,
    pub orders: Arc<OrderService<P>>,
    pub payments: PaymentService<P>,
    pub shipping: ShippingEstimator,
    /// Cancelled when the server shuts down.
    pub shutdown: CancellationToken,
}

impl<P: Persistence> AppState<P> {
    /// Token for one request; cancelled on shutdown.
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

/// Wires every service on top of `backend`.
pub fn create_state<P: Persistence>(
    backend: P,
    config: &Config,
    gateways: PaymentStrategyFactory,
    shipping: ShippingEstimator,
) -> Arc<AppState<P>> {
    let notifier = Arc::new(TracingNotifier);
    let discounts = DiscountService::new(backend.clone());
    let orders = Arc::new(OrderService::new(
        backend.clone(),
        discounts.clone(),
        notifier.clone(),
    ));
    let settings = CheckoutSettings {
        default_currency: config.default_currency,
    };

    Arc::new(AppState {
        carts: CartService::new(backend.clone(), settings),
        products: ProductService::new(backend.clone()),
        payments: PaymentService::new(backend, Arc::clone(&orders), Arc::new(gateways), notifier),
        discounts,
        orders,
        shipping,
        shutdown: CancellationToken::new(),
    })
}

/// The simulated gateways, configured from `config`.
pub fn default_gateways(config: &Config) -> PaymentStrategyFactory {
    let references = match config.payment_rng_seed {
        Some(seed) => ReferenceGenerator::seeded(seed),
        None => ReferenceGenerator::from_entropy(),
    };
    PaymentStrategyFactory::with_defaults(
        GatewayConfig {
            processing_delay: config.payment_processing_delay,
        },
        Arc::new(references),
    )
}

/// Flat shipping rates by state, resolved through the configured postal
/// lookup.
pub fn default_shipping(config: &Config) -> ShippingEstimator {
    let rate = |cents| Money::new(config.default_currency, Decimal::new(cents, 2));
    let rates = FlatRateTable::new(rate(3990))
        .with_rate("SP", rate(1490))
        .with_rate("RJ", rate(1990))
        .with_rate("MG", rate(1990));
    ShippingEstimator::new(
        Arc::new(HttpPostalLookup::new(&config.postal_lookup_url)),
        rates,
    )
}
