//! Service error taxonomy.
//!
//! Every workflow reports one of six outcomes. Lower-layer errors convert
//! into them with `From`, so `?` picks the right category.

use std::collections::BTreeMap;

use common::MoneyError;
use domain::repository::InvalidPageRequest;
use domain::{
    CartError, DiscountError, OrderError, PaymentRecordError, ProductError, RepositoryError,
};
use payments::PaymentError;
use serde::{Deserialize, Serialize};
use store::StoreError;
use thiserror::Error;

/// Field-level validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Errors surfaced by the workflow services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// User-correctable input problems.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A business rule forbids the operation.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A business operation failed as a whole.
    #[error("Failure: {0}")]
    Failure(String),

    /// Infrastructure or programming fault.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ServiceError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Validation(ValidationErrors::single(field, message))
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(what.to_string())
    }

    /// Checkout reports infrastructure faults as a failed checkout.
    pub(crate) fn into_checkout_failure(self) -> Self {
        match self {
            ServiceError::Unexpected(message) => ServiceError::Failure(message),
            other => other,
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        ServiceError::Unexpected(err.to_string())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::Unexpected(err.to_string())
    }
}

impl From<MoneyError> for ServiceError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::CurrencyMismatch { .. } | MoneyError::InvalidCurrency(_) => {
                ServiceError::validation("Currency", err.to_string())
            }
            MoneyError::InvalidAmount(_) | MoneyError::Overflow => {
                ServiceError::validation("Amount", err.to_string())
            }
        }
    }
}

impl From<InvalidPageRequest> for ServiceError {
    fn from(err: InvalidPageRequest) -> Self {
        ServiceError::validation(pascal_case(err.field), err.message)
    }
}

impl From<CartError> for ServiceError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InvalidQuantity { .. } => {
                ServiceError::validation("Quantity", err.to_string())
            }
            CartError::ItemNotFound { .. } => ServiceError::NotFound(err.to_string()),
            CartError::DuplicateItem { .. } | CartError::DiscountAlreadyApplied { .. } => {
                ServiceError::Conflict(err.to_string())
            }
            CartError::InvalidDiscountAmount { .. } => {
                ServiceError::validation("DiscountAmount", err.to_string())
            }
            CartError::Money(money) => money.into(),
        }
    }
}

impl From<ProductError> for ServiceError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::NameRequired => ServiceError::validation("Name", err.to_string()),
            ProductError::NonPositivePrice { .. } => {
                ServiceError::validation("Price", err.to_string())
            }
            ProductError::InvalidStatusTransition { .. } => ServiceError::Conflict(err.to_string()),
            ProductError::Money(money) => money.into(),
        }
    }
}

impl From<OrderError> for ServiceError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidStatusTransition { .. } => ServiceError::Conflict(err.to_string()),
            OrderError::InvalidAddress { address, field } => ServiceError::validation(
                format!("{}Address.{}", pascal_case(address), pascal_case(field)),
                err.to_string(),
            ),
            OrderError::NoItems => ServiceError::validation("Items", err.to_string()),
            OrderError::InvalidQuantity { .. } => {
                ServiceError::validation("Quantity", err.to_string())
            }
            OrderError::InvalidPrice { .. } => ServiceError::validation("Price", err.to_string()),
            OrderError::InvalidDiscount => {
                ServiceError::validation("DiscountTotal", err.to_string())
            }
            OrderError::Money(money) => money.into(),
        }
    }
}

impl From<DiscountError> for ServiceError {
    fn from(err: DiscountError) -> Self {
        match err {
            DiscountError::InvalidDefinition { field, .. } => {
                ServiceError::validation(pascal_case(field), err.to_string())
            }
            DiscountError::Money(money) => money.into(),
            DiscountError::Inactive
            | DiscountError::OutsideValidityWindow
            | DiscountError::UsageLimitReached { .. }
            | DiscountError::CustomerLimitReached { .. }
            | DiscountError::BelowMinimumOrder { .. }
            | DiscountError::CategoryMismatch => ServiceError::Conflict(err.to_string()),
        }
    }
}

impl From<PaymentRecordError> for ServiceError {
    fn from(err: PaymentRecordError) -> Self {
        match err {
            PaymentRecordError::InvalidTransition { .. } => ServiceError::Conflict(err.to_string()),
            PaymentRecordError::NonPositiveAmount => {
                ServiceError::validation("Amount", err.to_string())
            }
            _ => ServiceError::Unexpected(err.to_string()),
        }
    }
}

impl From<PaymentError> for ServiceError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(fields) => {
                let mut errors = ValidationErrors::new();
                for field in fields {
                    errors.add(field.field, field.message);
                }
                ServiceError::Validation(errors)
            }
            PaymentError::Declined(_) => ServiceError::Failure(err.to_string()),
            PaymentError::Cancelled
            | PaymentError::UnsupportedMethod(_)
            | PaymentError::Gateway(_) => ServiceError::Unexpected(err.to_string()),
        }
    }
}

/// `postal_code` -> `PostalCode`, matching the field names clients send.
fn pascal_case(snake: &str) -> String {
    snake
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
