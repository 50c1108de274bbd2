//! Shared fixtures for the workflow tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use common::{Money, UserId};
use domain::{Address, Discount, DiscountType, NewDiscount, NewProduct, PaymentMethod, Product};
use payments::{
    CreditCardDetails, CreditCardStrategy, GatewayConfig, PaymentDetails, PaymentStrategyFactory,
    PixDetails, ReferenceGenerator,
};
use services::{
    CartService, CheckoutRequest, CheckoutSettings, DiscountService, OrderService, PaymentService,
    ProductService, ShippingDetails, TracingNotifier,
};
use store::InMemoryBackend;
use tokio_util::sync::CancellationToken;

pub struct Shop {
    pub backend: InMemoryBackend,
    pub carts: CartService<InMemoryBackend>,
    pub products: ProductService<InMemoryBackend>,
    pub discounts: DiscountService<InMemoryBackend>,
    pub orders: Arc<OrderService<InMemoryBackend>>,
    pub payments: PaymentService<InMemoryBackend>,
    pub cancel: CancellationToken,
}

/// Gateways with no delay, a fixed reference seed and a pinned card
/// expiry date.
pub fn gateways() -> PaymentStrategyFactory {
    let config = GatewayConfig {
        processing_delay: Duration::ZERO,
    };
    let references = Arc::new(ReferenceGenerator::seeded(42));
    PaymentStrategyFactory::with_defaults(config.clone(), Arc::clone(&references)).with_strategy(
        Arc::new(
            CreditCardStrategy::new(config, references)
                .with_reference_date(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
        ),
    )
}

pub fn shop() -> Shop {
    shop_with(gateways())
}

pub fn shop_with(gateways: PaymentStrategyFactory) -> Shop {
    let backend = InMemoryBackend::new();
    let notifier = Arc::new(TracingNotifier);
    let discounts = DiscountService::new(backend.clone());
    let orders = Arc::new(OrderService::new(
        backend.clone(),
        discounts.clone(),
        notifier.clone(),
    ));
    Shop {
        carts: CartService::new(backend.clone(), CheckoutSettings::default()),
        products: ProductService::new(backend.clone()),
        payments: PaymentService::new(
            backend.clone(),
            Arc::clone(&orders),
            Arc::new(gateways),
            notifier,
        ),
        discounts,
        orders,
        backend,
        cancel: CancellationToken::new(),
    }
}

pub fn brl(amount: &str) -> Money {
    Money::parse("BRL", amount).unwrap()
}

pub fn customer() -> UserId {
    UserId::new("customer-1")
}

pub async fn seed_product(shop: &Shop, name: &str, price: &str, stock: u32) -> Product {
    let product = Product::create(NewProduct {
        name: name.to_string(),
        description: format!("{name} description"),
        price: brl(price),
        stock,
        image_url: None,
        categories: BTreeSet::new(),
    })
    .unwrap();
    shop.backend.seed_product(&product).await;
    product
}

pub fn new_discount(discount_type: DiscountType) -> NewDiscount {
    let now = Utc::now();
    NewDiscount {
        code: None,
        discount_type,
        fixed_amount: None,
        percentage: None,
        max_uses: 100,
        min_order_amount: brl("0"),
        max_uses_per_user: 5,
        valid_from: now - chrono::Duration::days(1),
        valid_to: now + chrono::Duration::days(30),
        auto_apply: false,
        categories: BTreeSet::new(),
    }
}

pub async fn seed_discount(shop: &Shop, new: NewDiscount) -> Discount {
    let discount = Discount::create(new, Utc::now()).unwrap();
    shop.backend.seed_discount(&discount).await;
    discount
}

pub fn address() -> Address {
    Address {
        street: "Av. Paulista".to_string(),
        number: "1000".to_string(),
        complement: None,
        district: "Bela Vista".to_string(),
        city: "São Paulo".to_string(),
        state: "SP".to_string(),
        postal_code: "01310-100".to_string(),
        country: "BR".to_string(),
    }
}

pub fn shipping() -> ShippingDetails {
    ShippingDetails {
        shipping_address: address(),
        billing_address: address(),
    }
}

pub fn card_checkout(card_number: &str) -> CheckoutRequest {
    CheckoutRequest {
        method: PaymentMethod::CreditCard,
        details: PaymentDetails::CreditCard(CreditCardDetails {
            card_number: card_number.to_string(),
            card_holder_name: "Maria Silva".to_string(),
            expiration_date: "12/28".to_string(),
            cvv: "123".to_string(),
        }),
        shipping: shipping(),
    }
}

pub fn pix_checkout() -> CheckoutRequest {
    CheckoutRequest {
        method: PaymentMethod::Pix,
        details: PaymentDetails::Pix(PixDetails::default()),
        shipping: shipping(),
    }
}
