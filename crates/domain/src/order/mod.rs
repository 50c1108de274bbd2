//! Order aggregate and related types.

mod aggregate;
mod state;
mod value_objects;

pub use aggregate::{Order, OrderParts};
pub use state::OrderStatus;
pub use value_objects::{Address, OrderItem};

use common::{MoneyError, ProductId};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Order is not in a state that allows the transition.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Invalid quantity.
    #[error("Invalid quantity for {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// Unit price must be positive.
    #[error("Invalid price for {product_id}")]
    InvalidPrice { product_id: ProductId },

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// A required address field is missing.
    #[error("Invalid {address} address: {field} is required")]
    InvalidAddress {
        address: &'static str,
        field: &'static str,
    },

    /// Discount total must be non-negative.
    #[error("Invalid discount total")]
    InvalidDiscount,

    #[error(transparent)]
    Money(#[from] MoneyError),
}
