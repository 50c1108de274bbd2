//! Integration tests for the simulated gateways.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use common::Money;
use domain::PaymentMethod;
use payments::reference::is_well_formed;
use payments::{
    CreditCardDetails, CreditCardStrategy, GatewayConfig, PayPalDetails, PaymentDetails,
    PaymentError, PaymentRequest, PaymentStrategy, PaymentStrategyFactory, PixDetails,
    ReferenceGenerator,
};
use tokio_util::sync::CancellationToken;

fn config(delay_ms: u64) -> GatewayConfig {
    GatewayConfig {
        processing_delay: Duration::from_millis(delay_ms),
    }
}

fn card_request(number: &str) -> PaymentRequest {
    PaymentRequest {
        amount: Money::parse("BRL", "100.00").unwrap(),
        details: PaymentDetails::CreditCard(CreditCardDetails {
            card_number: number.to_string(),
            card_holder_name: "Maria Silva".to_string(),
            expiration_date: "12/28".to_string(),
            cvv: "123".to_string(),
        }),
    }
}

fn card_strategy(delay_ms: u64) -> CreditCardStrategy {
    CreditCardStrategy::new(config(delay_ms), Arc::new(ReferenceGenerator::seeded(11)))
        .with_reference_date(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
}

#[tokio::test(start_paused = true)]
async fn credit_card_payment_is_approved_after_delay() {
    let response = card_strategy(500)
        .process_payment(&card_request("4111111111111111"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(response.is_success);
    assert!(is_well_formed(&response.reference), "{}", response.reference);
}

#[tokio::test]
async fn invalid_card_never_reaches_the_gateway() {
    let err = card_strategy(0)
        .process_payment(&card_request("1234567890123456"), &CancellationToken::new())
        .await
        .unwrap_err();

    let PaymentError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "CardNumber");
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_processing() {
    let strategy = card_strategy(60_000);
    let cancel = CancellationToken::new();
    let request = card_request("4111111111111111");

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let err = strategy.process_payment(&request, &cancel).await.unwrap_err();
    assert_eq!(err, PaymentError::Cancelled);
}

#[tokio::test]
async fn strategy_rejects_details_of_another_method() {
    let request = PaymentRequest {
        amount: Money::parse("BRL", "10.00").unwrap(),
        details: PaymentDetails::Pix(PixDetails::default()),
    };
    let err = card_strategy(0)
        .process_payment(&request, &CancellationToken::new())
        .await
        .unwrap_err();
    let PaymentError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert_eq!(errors[0].field, "PaymentDetails");
}

#[tokio::test]
async fn factory_dispatches_by_method() {
    let factory =
        PaymentStrategyFactory::with_defaults(config(0), Arc::new(ReferenceGenerator::seeded(5)));
    let cancel = CancellationToken::new();

    let paypal = PaymentRequest {
        amount: Money::parse("BRL", "25.00").unwrap(),
        details: PaymentDetails::PayPal(PayPalDetails {
            email: "buyer@example.com".to_string(),
            payer_id: "PAYER-1".to_string(),
        }),
    };
    let response = factory
        .resolve(PaymentMethod::PayPal)
        .unwrap()
        .process_payment(&paypal, &cancel)
        .await
        .unwrap();
    assert!(response.is_success);

    let pix = PaymentRequest {
        amount: Money::parse("BRL", "25.00").unwrap(),
        details: PaymentDetails::Pix(PixDetails::default()),
    };
    let response = factory
        .resolve(PaymentMethod::Pix)
        .unwrap()
        .process_payment(&pix, &cancel)
        .await
        .unwrap();
    assert!(response.is_success);
    assert_ne!(response.transaction_id, uuid::Uuid::nil());
}
