//! Pix instant payments.

use std::sync::Arc;

use async_trait::async_trait;
use domain::PaymentMethod;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::strategy::record_gateway_call;
use crate::{
    GatewayResponse, PaymentDetails, PaymentError, PaymentRequest, PaymentStrategy,
    ReferenceGenerator, Result,
};

/// Pix settles immediately; there is nothing to validate or wait for.
pub struct PixStrategy {
    references: Arc<ReferenceGenerator>,
}

impl PixStrategy {
    pub fn new(references: Arc<ReferenceGenerator>) -> Self {
        Self { references }
    }
}

#[async_trait]
impl PaymentStrategy for PixStrategy {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Pix
    }

    async fn process_payment(
        &self,
        request: &PaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<GatewayResponse> {
        if !matches!(request.details, PaymentDetails::Pix(_)) {
            return Err(PaymentError::field("PaymentDetails", "Pix details are required"));
        }
        if cancel.is_cancelled() {
            return Err(PaymentError::Cancelled);
        }

        record_gateway_call(self.method(), "approved");
        Ok(GatewayResponse {
            transaction_id: Uuid::new_v4(),
            reference: self.references.next_reference(),
            is_success: true,
            message: "Pix payment settled".to_string(),
        })
    }
}
