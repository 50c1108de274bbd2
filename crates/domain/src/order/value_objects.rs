//! Value objects for the order domain.

use common::{Money, MoneyError, OrderItemId, ProductId};
use serde::{Deserialize, Serialize};

use super::OrderError;

/// Postal address used for shipping and billing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    /// State or province code.
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl Address {
    /// Checks that every required field is present.
    ///
    /// `kind` names the address in the error (`"shipping"` or `"billing"`).
    pub fn validate(&self, kind: &'static str) -> Result<(), OrderError> {
        let required = [
            ("street", &self.street),
            ("number", &self.number),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(OrderError::InvalidAddress {
                    address: kind,
                    field,
                });
            }
        }
        Ok(())
    }
}

/// An item in an order.
///
/// The unit price is a snapshot taken at purchase time and does not follow
/// later product price changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Line identifier.
    pub id: OrderItemId,

    /// The product identifier.
    pub product_id: ProductId,

    /// Human-readable product name at purchase time.
    pub product_name: String,

    /// Quantity ordered.
    pub quantity: u32,

    /// Price per unit at purchase time.
    pub unit_price: Money,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            id: OrderItemId::new(),
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns the total price for this item (quantity * unit_price).
    pub fn total_price(&self) -> Result<Money, MoneyError> {
        self.unit_price.try_times(self.quantity)
    }

    pub(crate) fn validate(&self) -> Result<(), OrderError> {
        if self.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: self.product_id,
                quantity: self.quantity,
            });
        }
        if !self.unit_price.is_positive() {
            return Err(OrderError::InvalidPrice {
                product_id: self.product_id,
            });
        }
        Ok(())
    }
}
