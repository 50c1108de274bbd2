//! PayPal gateway.

use std::sync::Arc;

use async_trait::async_trait;
use domain::PaymentMethod;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::strategy::{record_gateway_call, simulate_processing};
use crate::{
    FieldError, GatewayConfig, GatewayResponse, PayPalDetails, PaymentDetails, PaymentError,
    PaymentRequest, PaymentStrategy, ReferenceGenerator, Result,
};

/// Simulated PayPal checkout. The payer has already approved the payment
/// on PayPal's side; the gateway only captures it.
pub struct PayPalStrategy {
    config: GatewayConfig,
    references: Arc<ReferenceGenerator>,
}

impl PayPalStrategy {
    pub fn new(config: GatewayConfig, references: Arc<ReferenceGenerator>) -> Self {
        Self { config, references }
    }

    fn validate(details: &PayPalDetails) -> Result<()> {
        let mut errors = Vec::new();
        let email = details.email.trim();
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !well_formed {
            errors.push(FieldError::new("Email", "A valid PayPal email is required"));
        }
        if details.payer_id.trim().is_empty() {
            errors.push(FieldError::new("PayerId", "Payer id is required"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PaymentError::Validation(errors))
        }
    }
}

#[async_trait]
impl PaymentStrategy for PayPalStrategy {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::PayPal
    }

    #[tracing::instrument(skip(self, request, cancel), fields(amount = %request.amount))]
    async fn process_payment(
        &self,
        request: &PaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<GatewayResponse> {
        let PaymentDetails::PayPal(details) = &request.details else {
            return Err(PaymentError::field(
                "PaymentDetails",
                "PayPal details are required",
            ));
        };
        if let Err(err) = Self::validate(details) {
            record_gateway_call(self.method(), "invalid");
            return Err(err);
        }

        tracing::info!(payer_id = %details.payer_id, "Capturing PayPal payment");
        simulate_processing(self.config.processing_delay, cancel).await?;

        record_gateway_call(self.method(), "approved");
        Ok(GatewayResponse {
            transaction_id: Uuid::new_v4(),
            reference: self.references.next_reference(),
            is_success: true,
            message: "PayPal payment captured".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_and_payer_are_required() {
        let err = PayPalStrategy::validate(&PayPalDetails {
            email: "not-an-email".to_string(),
            payer_id: String::new(),
        })
        .unwrap_err();
        let PaymentError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["Email", "PayerId"]);
    }

    #[test]
    fn valid_details_pass() {
        assert!(
            PayPalStrategy::validate(&PayPalDetails {
                email: "buyer@example.com".to_string(),
                payer_id: "PAYER123".to_string(),
            })
            .is_ok()
        );
    }
}
