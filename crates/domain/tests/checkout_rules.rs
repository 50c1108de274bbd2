//! Integration tests for the rules that span several aggregates during a
//! checkout: cart totals, discounts, order snapshots and payment records.

use std::collections::BTreeSet;

use chrono::{Duration, Utc};
use common::{CurrencyCode, Money, UserId};
use domain::{
    Address, AppliedDiscount, Cart, Discount, DiscountHistory, DiscountType, MethodDetails,
    NewDiscount, NewProduct, Order, OrderItem, PaymentRecord, PaymentStatus, Product,
};
use rust_decimal::Decimal;
use uuid::Uuid;

fn brl(amount: &str) -> Money {
    Money::parse("BRL", amount).unwrap()
}

fn product(name: &str, price: &str, stock: u32) -> Product {
    Product::create(NewProduct {
        name: name.to_string(),
        description: String::new(),
        price: brl(price),
        stock,
        image_url: None,
        categories: BTreeSet::new(),
    })
    .unwrap()
}

fn address() -> Address {
    Address {
        street: "Rua Augusta".to_string(),
        number: "500".to_string(),
        complement: None,
        district: "Consolação".to_string(),
        city: "São Paulo".to_string(),
        state: "SP".to_string(),
        postal_code: "01304-000".to_string(),
        country: "BR".to_string(),
    }
}

fn discount(kind: DiscountType, fixed: Option<&str>, percentage: Option<u32>) -> Discount {
    let now = Utc::now();
    Discount::create(
        NewDiscount {
            code: (kind == DiscountType::Coupon).then(|| "WELCOME".to_string()),
            discount_type: kind,
            fixed_amount: fixed.map(brl),
            percentage: percentage.map(Decimal::from),
            max_uses: 1,
            min_order_amount: brl("0"),
            max_uses_per_user: 1,
            valid_from: now - Duration::hours(1),
            valid_to: now + Duration::hours(1),
            auto_apply: kind != DiscountType::Coupon,
            categories: BTreeSet::new(),
        },
        now,
    )
    .unwrap()
}

fn order_items(cart: &Cart, products: &[Product]) -> Vec<OrderItem> {
    cart.items()
        .iter()
        .map(|line| {
            let product = products
                .iter()
                .find(|p| p.id() == line.product_id())
                .unwrap();
            OrderItem::new(
                line.product_id(),
                product.name(),
                line.quantity(),
                line.unit_price(),
            )
        })
        .collect()
}

#[test]
fn order_snapshots_cart_prices() {
    let mut widget = product("Widget", "50.00", 10);
    let mut cart = Cart::create(UserId::new("alice"), CurrencyCode::parse("BRL").unwrap());
    cart.add_item(widget.id(), 2, widget.price()).unwrap();

    let order = Order::create(
        cart.user_id().clone(),
        address(),
        address(),
        order_items(&cart, std::slice::from_ref(&widget)),
        cart.discount_total(),
    )
    .unwrap();

    widget.update_price(brl("80.00")).unwrap();

    assert_eq!(order.items()[0].unit_price, brl("50.00"));
    assert_eq!(order.total_amount(), brl("100.00"));
}

#[test]
fn stacked_discounts_are_capped_at_cart_total() {
    let gadget = product("Gadget", "30.00", 5);
    let mut cart = Cart::create(UserId::new("bob"), CurrencyCode::parse("BRL").unwrap());
    cart.add_item(gadget.id(), 1, gadget.price()).unwrap();

    for d in [
        discount(DiscountType::Fixed, Some("20.00"), None),
        discount(DiscountType::Percentage, None, Some(50)),
    ] {
        let amount = d.calculate_amount(cart.total_amount()).unwrap();
        cart.apply_discount(AppliedDiscount {
            discount_id: d.id(),
            code: d.code().map(str::to_string),
            amount,
        })
        .unwrap();
    }

    assert_eq!(cart.discount_total(), brl("30.00"));
    assert!(cart.total_with_discount().is_zero());
}

#[test]
fn single_use_discount_reaches_limit_after_one_order() {
    let mut coupon = discount(DiscountType::Coupon, Some("10.00"), None);
    let order_total = brl("100.00");
    let amount = coupon.calculate_amount(order_total).unwrap();

    let outcome = coupon.increment_usage().unwrap();
    assert!(outcome.reached_limit);
    assert!(coupon.deactivate());
    assert!(!coupon.is_valid_at(Utc::now()));

    let history = DiscountHistory::record(
        &coupon,
        common::OrderId::new(),
        UserId::new("carol"),
        amount,
    );
    assert_eq!(history.coupon_code.as_deref(), Some("WELCOME"));
    assert_eq!(history.discount_amount, brl("10.00"));
}

#[test]
fn payment_record_follows_order_total() {
    let widget = product("Widget", "50.00", 10);
    let mut cart = Cart::create(UserId::new("dave"), CurrencyCode::parse("BRL").unwrap());
    cart.add_item(widget.id(), 2, widget.price()).unwrap();
    let order = Order::create(
        cart.user_id().clone(),
        address(),
        address(),
        order_items(&cart, std::slice::from_ref(&widget)),
        cart.discount_total(),
    )
    .unwrap();

    let mut payment = PaymentRecord::create(
        order.id(),
        order.total_amount(),
        Uuid::new_v4(),
        "approved",
        MethodDetails::Pix,
    )
    .unwrap();
    payment.mark_as_succeeded("ORD-20250101-XYZ001").unwrap();

    assert_eq!(payment.amount(), brl("100.00"));
    assert_eq!(payment.status(), PaymentStatus::Succeeded);
}
