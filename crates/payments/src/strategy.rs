use std::time::Duration;

use async_trait::async_trait;
use domain::PaymentMethod;
use tokio_util::sync::CancellationToken;

use crate::{GatewayResponse, PaymentError, PaymentRequest, Result};

/// Settings shared by the simulated gateways.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// How long a gateway takes to answer.
    pub processing_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            processing_delay: Duration::from_millis(500),
        }
    }
}

/// A gateway for one payment method.
#[async_trait]
pub trait PaymentStrategy: Send + Sync {
    fn method(&self) -> PaymentMethod;

    /// Validates the request and charges it.
    ///
    /// Validation problems are reported as [`PaymentError::Validation`]
    /// without contacting the gateway.
    async fn process_payment(
        &self,
        request: &PaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<GatewayResponse>;
}

/// Waits for the gateway, giving up as soon as `cancel` fires.
pub(crate) async fn simulate_processing(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    if delay.is_zero() {
        return if cancel.is_cancelled() {
            Err(PaymentError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PaymentError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

pub(crate) fn record_gateway_call(method: PaymentMethod, outcome: &'static str) {
    metrics::counter!(
        "payment_gateway_calls_total",
        "method" => method.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}
