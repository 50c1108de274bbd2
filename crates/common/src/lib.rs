//! Shared value types for the commerce workspace.
//!
//! This crate is the leaf of the dependency graph: identifier newtypes and the
//! currency-tagged [`Money`] type used by every aggregate.

mod ids;
pub mod money;

pub use ids::{
    CartId, CartItemId, CategoryId, DiscountHistoryId, DiscountId, OrderId, OrderItemId,
    PaymentId, ProductId, UserId,
};
pub use money::{CurrencyCode, Money, MoneyError};
