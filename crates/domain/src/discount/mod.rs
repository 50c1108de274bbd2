//! Discount aggregate and its usage history.

mod aggregate;
mod history;

pub use aggregate::{Discount, DiscountParts, NewDiscount, UsageOutcome};
pub use history::DiscountHistory;

use common::{Money, MoneyError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a discount computes its amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscountType {
    /// A fixed amount off the order.
    Fixed,
    /// A percentage of the order total.
    Percentage,
    /// Redeemed by code; may carry a fixed amount, a percentage or both.
    Coupon,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Fixed => "Fixed",
            DiscountType::Percentage => "Percentage",
            DiscountType::Coupon => "Coupon",
        }
    }
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during discount operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscountError {
    /// The discount definition breaks a field-level rule.
    #[error("Invalid discount {field}: {message}")]
    InvalidDefinition {
        field: &'static str,
        message: String,
    },

    /// The discount has been deactivated.
    #[error("Discount is not active")]
    Inactive,

    /// The discount cannot be used at this moment.
    #[error("Discount is outside its validity window")]
    OutsideValidityWindow,

    /// Every allowed use has been consumed.
    #[error("Discount usage limit reached: {uses}/{max_uses}")]
    UsageLimitReached { uses: u32, max_uses: u32 },

    /// The customer already used the discount as often as allowed.
    #[error("Discount already used {uses} times by this customer (limit {limit})")]
    CustomerLimitReached { uses: u32, limit: u32 },

    /// The order total is below the discount minimum.
    #[error("Order total is below the minimum of {minimum}")]
    BelowMinimumOrder { minimum: Money },

    /// None of the cart products belong to the discount categories.
    #[error("Discount does not apply to the products in the cart")]
    CategoryMismatch,

    #[error(transparent)]
    Money(#[from] MoneyError),
}

impl DiscountError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        DiscountError::InvalidDefinition {
            field,
            message: message.into(),
        }
    }
}
