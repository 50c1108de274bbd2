//! Shipping estimates with a stubbed postal lookup.

use std::sync::Arc;

use async_trait::async_trait;
use common::Money;
use services::{
    FlatRateTable, PostalAddress, PostalLookup, Result, ServiceError, ShippingEstimator,
};
use tokio_util::sync::CancellationToken;

struct KnownCodes;

#[async_trait]
impl PostalLookup for KnownCodes {
    async fn lookup(
        &self,
        postal_code: &str,
        _cancel: &CancellationToken,
    ) -> Result<Option<PostalAddress>> {
        let state = match postal_code {
            "01310100" => "SP",
            "69005000" => "AM",
            _ => return Ok(None),
        };
        Ok(Some(PostalAddress {
            postal_code: postal_code.to_string(),
            street: String::new(),
            district: String::new(),
            city: String::new(),
            state: state.to_string(),
        }))
    }
}

fn brl(amount: &str) -> Money {
    Money::parse("BRL", amount).unwrap()
}

fn estimator() -> ShippingEstimator {
    ShippingEstimator::new(
        Arc::new(KnownCodes),
        FlatRateTable::new(brl("39.90")).with_rate("SP", brl("14.90")),
    )
}

#[tokio::test]
async fn rate_follows_the_destination_state() {
    let cancel = CancellationToken::new();
    let near = estimator().estimate("01310-100", &cancel).await.unwrap();
    assert_eq!(near.destination.state, "SP");
    assert_eq!(near.cost, brl("14.90"));

    let far = estimator().estimate("69005-000", &cancel).await.unwrap();
    assert_eq!(far.cost, brl("39.90"));
}

#[tokio::test]
async fn unknown_postal_code_is_not_found() {
    let err = estimator()
        .estimate("99999-999", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn malformed_postal_code_is_rejected_before_lookup() {
    let err = estimator()
        .estimate("123", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(errors) if errors.contains("PostalCode")));
}
