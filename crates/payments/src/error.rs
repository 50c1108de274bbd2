use domain::PaymentMethod;
use thiserror::Error;

/// A rejected input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Errors that can occur while processing a payment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// The payment details failed validation before reaching the gateway.
    #[error("Invalid payment details: {}", describe(.0))]
    Validation(Vec<FieldError>),

    /// The gateway refused the payment.
    #[error("Payment declined: {0}")]
    Declined(String),

    /// The caller cancelled while the gateway was processing.
    #[error("Payment cancelled")]
    Cancelled,

    /// No strategy is registered for the method.
    #[error("Unsupported payment method: {0}")]
    UnsupportedMethod(PaymentMethod),

    /// The gateway could not be reached.
    #[error("Gateway error: {0}")]
    Gateway(String),
}

impl PaymentError {
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        PaymentError::Validation(vec![FieldError::new(field, message)])
    }
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for payment operations.
pub type Result<T> = std::result::Result<T, PaymentError>;
