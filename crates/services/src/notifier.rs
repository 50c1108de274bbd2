//! Post-commit notifications.

use async_trait::async_trait;
use common::{Money, OrderId, PaymentId, UserId};
use domain::PaymentMethod;
use serde::Serialize;

/// Something worth telling the customer about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    OrderPlaced {
        user_id: UserId,
        order_id: OrderId,
        payment_id: PaymentId,
        method: PaymentMethod,
        amount: Money,
        reference: String,
    },
    OrderCancelled {
        user_id: UserId,
        order_id: OrderId,
    },
    PaymentRefunded {
        order_id: OrderId,
        payment_id: PaymentId,
        amount: Money,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::OrderPlaced { .. } => "order_placed",
            Notification::OrderCancelled { .. } => "order_cancelled",
            Notification::PaymentRefunded { .. } => "payment_refunded",
        }
    }
}

/// Delivers notifications.
///
/// Called only after the triggering transaction committed. Delivery is
/// fire-and-forget: implementations log their own failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) {
        match serde_json::to_string(&notification) {
            Ok(payload) => tracing::info!(kind = notification.kind(), %payload, "Notification"),
            Err(err) => tracing::warn!(error = %err, "Failed to encode notification"),
        }
    }
}
