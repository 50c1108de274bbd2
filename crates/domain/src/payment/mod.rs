//! Payment record aggregate and its status machine.

mod record;

pub use record::{PaymentParts, PaymentRecord};

use chrono::{DateTime, Utc};
use common::MoneyError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during payment record operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentRecordError {
    /// The status machine does not allow the transition.
    #[error("Invalid payment transition from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Method details do not belong to the payment method.
    #[error("Payment details do not match method {method}")]
    MethodMismatch { method: PaymentMethod },

    /// Amount must be positive.
    #[error("Payment amount must be positive")]
    NonPositiveAmount,

    /// Stored record has no status history.
    #[error("Payment record has an empty status history")]
    EmptyHistory,

    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Supported payment methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PaymentMethod {
    CreditCard,
    PayPal,
    Pix,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "CreditCard",
            PaymentMethod::PayPal => "PayPal",
            PaymentMethod::Pix => "Pix",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status of a payment.
///
/// Status transitions:
/// ```text
/// Processing ──► Succeeded ──► RefundRequested ──► Refunded
///     │
///     └──► Failed
/// ```
/// `Failed`, `Refunded` and `Cancelled` are terminal. `Unknown` is what a
/// gateway reports when it cannot tell; nothing leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    #[default]
    Processing,
    Succeeded,
    Failed,
    RefundRequested,
    Refunded,
    Cancelled,
    Unknown,
}

impl PaymentStatus {
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Processing, Succeeded)
                | (Processing, Failed)
                | (Succeeded, RefundRequested)
                | (RefundRequested, Refunded)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Refunded | PaymentStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Processing => "Processing",
            PaymentStatus::Succeeded => "Succeeded",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::RefundRequested => "RefundRequested",
            PaymentStatus::Refunded => "Refunded",
            PaymentStatus::Cancelled => "Cancelled",
            PaymentStatus::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of a payment's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: PaymentStatus,
    pub timestamp: DateTime<Utc>,
    /// Gateway reference or failure reason.
    pub reference: Option<String>,
}

/// Method-specific data kept with a payment. Never holds a full card number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MethodDetails {
    CreditCard { last_four: String, brand: String },
    PayPal { email: String, payer_id: String },
    Pix,
}

impl MethodDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            MethodDetails::CreditCard { .. } => PaymentMethod::CreditCard,
            MethodDetails::PayPal { .. } => PaymentMethod::PayPal,
            MethodDetails::Pix => PaymentMethod::Pix,
        }
    }
}
