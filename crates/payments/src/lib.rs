//! Payment gateways for the checkout workflow.
//!
//! Each [`PaymentMethod`](domain::PaymentMethod) is served by one
//! [`PaymentStrategy`]; the [`PaymentStrategyFactory`] resolves a strategy
//! by method. Gateways are simulated in-process.

pub mod credit_card;
pub mod error;
pub mod factory;
pub mod paypal;
pub mod pix;
pub mod reference;
pub mod request;
pub mod strategy;

pub use credit_card::{CardBrand, CreditCardStrategy};
pub use error::{FieldError, PaymentError, Result};
pub use factory::PaymentStrategyFactory;
pub use paypal::PayPalStrategy;
pub use pix::PixStrategy;
pub use reference::ReferenceGenerator;
pub use request::{
    CreditCardDetails, GatewayResponse, PayPalDetails, PaymentDetails, PaymentRequest, PixDetails,
};
pub use strategy::{GatewayConfig, PaymentStrategy};
