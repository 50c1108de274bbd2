//! Orchestration services for the commerce workflow.
//!
//! Each service is generic over a [`store::Persistence`] backend and opens
//! one [`store::UnitOfWork`] per call:
//!
//! - [`CartService`]: one cart per user, lines and applied discounts
//! - [`ProductService`]: catalog maintenance and stock adjustments
//! - [`DiscountService`]: discount definitions, coupons and automatic discounts
//! - [`OrderService`]: turns a cart into an order, decrementing stock
//! - [`PaymentService`]: checkout, charging the cart and placing the order
//!   in a single transaction
//!
//! [`Notifier`] and [`ShippingEstimator`] are collaborators at the edges of
//! the workflow.

pub mod cart;
pub mod discount;
pub mod error;
pub mod notifier;
pub mod order;
pub mod payment;
pub mod product;
pub mod settings;
pub mod shipping;

mod transaction;

pub use cart::CartService;
pub use discount::DiscountService;
pub use error::{Result, ServiceError, ValidationErrors};
pub use notifier::{Notification, Notifier, TracingNotifier};
pub use order::{OrderService, ShippingDetails};
pub use payment::{CheckoutReceipt, CheckoutRequest, PaymentService};
pub use product::{ProductService, StatusChangeAction};
pub use settings::CheckoutSettings;
pub use shipping::{
    FlatRateTable, HttpPostalLookup, PostalAddress, PostalLookup, ShippingEstimate,
    ShippingEstimator,
};
