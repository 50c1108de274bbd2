//! Shopping cart aggregate.

mod aggregate;

pub use aggregate::{AppliedDiscount, Cart, CartItem, CartParts};

use common::{DiscountId, MoneyError, ProductId};
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Quantity must be positive.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// The product is not in the cart.
    #[error("Item not found: {product_id}")]
    ItemNotFound { product_id: ProductId },

    /// Stored cart holds two lines for the same product.
    #[error("Duplicate cart line for product {product_id}")]
    DuplicateItem { product_id: ProductId },

    /// The discount has already been applied to this cart.
    #[error("Discount {discount_id} is already applied")]
    DiscountAlreadyApplied { discount_id: DiscountId },

    /// A discount amount must not be negative.
    #[error("Invalid discount amount for {discount_id}")]
    InvalidDiscountAmount { discount_id: DiscountId },

    /// Amount currency does not match the cart currency.
    #[error(transparent)]
    Money(#[from] MoneyError),
}
