//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CurrencyCode, Money, MoneyError, OrderId, UserId};
use serde::{Deserialize, Serialize};

use super::{Address, OrderError, OrderItem, OrderStatus};

/// Storage representation of an order.
///
/// Totals are not part of the stored shape; they are recomputed from the
/// items when the order is rehydrated.
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub items: Vec<OrderItem>,
    pub discount_total: Money,
}

/// Order aggregate root.
///
/// An order is created atomically with its items. Item prices are snapshots
/// and the totals are derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    order_date: DateTime<Utc>,
    status: OrderStatus,
    shipping_address: Address,
    billing_address: Address,
    items: Vec<OrderItem>,
    subtotal: Money,
    discount_total: Money,
    total_amount: Money,
}

impl Order {
    /// Creates a new order in `Created` status.
    pub fn create(
        user_id: UserId,
        shipping_address: Address,
        billing_address: Address,
        items: Vec<OrderItem>,
        discount_total: Money,
    ) -> Result<Self, OrderError> {
        Self::from_parts(OrderParts {
            id: OrderId::new(),
            user_id,
            order_date: Utc::now(),
            status: OrderStatus::Created,
            shipping_address,
            billing_address,
            items,
            discount_total,
        })
    }

    /// Rehydrates an order from storage, re-checking its invariants.
    pub fn from_parts(parts: OrderParts) -> Result<Self, OrderError> {
        parts.shipping_address.validate("shipping")?;
        parts.billing_address.validate("billing")?;

        let currency = parts
            .items
            .first()
            .map(|item| item.unit_price.currency())
            .ok_or(OrderError::NoItems)?;
        for item in &parts.items {
            item.validate()?;
        }

        let line_totals = parts
            .items
            .iter()
            .map(OrderItem::total_price)
            .collect::<Result<Vec<_>, _>>()?;
        let subtotal = Money::sum(currency, line_totals)?;
        let (discount_total, total_amount) =
            apply_discount(currency, subtotal, parts.discount_total)?;

        Ok(Self {
            id: parts.id,
            user_id: parts.user_id,
            order_date: parts.order_date,
            status: parts.status,
            shipping_address: parts.shipping_address,
            billing_address: parts.billing_address,
            items: parts.items,
            subtotal,
            discount_total,
            total_amount,
        })
    }

    /// Returns the storage representation of this order.
    pub fn to_parts(&self) -> OrderParts {
        OrderParts {
            id: self.id,
            user_id: self.user_id.clone(),
            order_date: self.order_date,
            status: self.status,
            shipping_address: self.shipping_address.clone(),
            billing_address: self.billing_address.clone(),
            items: self.items.clone(),
            discount_total: self.discount_total,
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    pub fn billing_address(&self) -> &Address {
        &self.billing_address
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the number of lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the total quantity of all items.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Sum of line totals before discounts.
    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn discount_total(&self) -> Money {
        self.discount_total
    }

    /// Amount charged: subtotal minus discounts.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn currency(&self) -> CurrencyCode {
        self.total_amount.currency()
    }

    /// Returns true if the order is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods
impl Order {
    /// Moves the order to `next`, enforcing the status machine.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Cancels the order.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Cancelled)
    }
}

/// Caps the discount at the subtotal and returns `(discount, total)`.
fn apply_discount(
    currency: CurrencyCode,
    subtotal: Money,
    discount: Money,
) -> Result<(Money, Money), OrderError> {
    if discount.currency() != currency {
        return Err(MoneyError::CurrencyMismatch {
            left: currency,
            right: discount.currency(),
        }
        .into());
    }
    if discount.is_negative() {
        return Err(OrderError::InvalidDiscount);
    }
    let discount = discount.try_min(subtotal)?;
    let total = subtotal.try_sub(discount)?;
    Ok((discount, total))
}
