//! Domain layer for the commerce workflow.
//!
//! This crate provides:
//! - Aggregates (cart, product, order, discount, payment record) that
//!   enforce their own invariants
//! - Typed errors for expected business violations
//! - Repository contracts implemented by the storage layer

pub mod cart;
pub mod discount;
pub mod order;
pub mod payment;
pub mod product;
pub mod repository;

pub use cart::{AppliedDiscount, Cart, CartError, CartItem};
pub use discount::{Discount, DiscountError, DiscountHistory, DiscountType, NewDiscount};
pub use order::{Address, Order, OrderError, OrderItem, OrderStatus};
pub use payment::{
    MethodDetails, PaymentMethod, PaymentRecord, PaymentRecordError, PaymentStatus, StatusChange,
};
pub use product::{CategoryRef, NewProduct, Product, ProductError, ProductStatus};
pub use repository::{
    CartRepository, DiscountFilter, DiscountRepository, OrderRepository, Page, PageRequest,
    PaymentRepository, ProductRepository, RepositoryError,
};
