//! Cart aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, CurrencyCode, DiscountId, Money, MoneyError, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::CartError;

/// A single product line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    id: CartItemId,
    product_id: ProductId,
    quantity: u32,
    unit_price: Money,
    total_price: Money,
}

impl CartItem {
    fn new(product_id: ProductId, quantity: u32, unit_price: Money) -> Result<Self, CartError> {
        Ok(Self {
            id: CartItemId::new(),
            product_id,
            quantity,
            unit_price,
            total_price: unit_price.try_times(quantity)?,
        })
    }

    /// Rebuilds a stored cart line, recomputing its total.
    pub fn from_parts(
        id: CartItemId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }
        Ok(Self {
            id,
            product_id,
            quantity,
            unit_price,
            total_price: unit_price.try_times(quantity)?,
        })
    }

    pub fn id(&self) -> CartItemId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    /// Returns `unit_price * quantity`.
    pub fn total_price(&self) -> Money {
        self.total_price
    }

    /// Returns this line repriced at `quantity` units of `unit_price`.
    fn repriced(&self, quantity: u32, unit_price: Money) -> Result<Self, CartError> {
        Ok(Self {
            quantity,
            unit_price,
            total_price: unit_price.try_times(quantity)?,
            ..self.clone()
        })
    }
}

/// A discount that has been applied to a cart, with the amount it takes off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub discount_id: DiscountId,
    pub code: Option<String>,
    pub amount: Money,
}

/// Storage representation of a cart.
///
/// Used to rehydrate a [`Cart`] through [`Cart::from_parts`], which re-checks
/// every invariant instead of trusting the stored values.
#[derive(Debug, Clone)]
pub struct CartParts {
    pub id: CartId,
    pub user_id: UserId,
    pub currency: CurrencyCode,
    pub items: Vec<CartItem>,
    pub applied_discounts: Vec<AppliedDiscount>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cart aggregate root.
///
/// A user owns exactly one cart. The cart holds at most one line per product;
/// the cart total is always derived from its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    id: CartId,
    user_id: UserId,
    currency: CurrencyCode,
    items: Vec<CartItem>,
    applied_discounts: Vec<AppliedDiscount>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new empty cart for a user.
    pub fn create(user_id: UserId, currency: CurrencyCode) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::new(),
            user_id,
            currency,
            items: Vec::new(),
            applied_discounts: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rehydrates a cart from storage.
    pub fn from_parts(parts: CartParts) -> Result<Self, CartError> {
        let mut items: Vec<CartItem> = Vec::with_capacity(parts.items.len());
        for item in parts.items {
            if items.iter().any(|i| i.product_id == item.product_id) {
                return Err(CartError::DuplicateItem {
                    product_id: item.product_id,
                });
            }
            ensure_currency(parts.currency, &item.unit_price)?;
            items.push(CartItem::from_parts(
                item.id,
                item.product_id,
                item.quantity,
                item.unit_price,
            )?);
        }

        for discount in &parts.applied_discounts {
            ensure_currency(parts.currency, &discount.amount)?;
            if discount.amount.is_negative() {
                return Err(CartError::InvalidDiscountAmount {
                    discount_id: discount.discount_id,
                });
            }
        }

        Money::sum(parts.currency, items.iter().map(CartItem::total_price))?;

        Ok(Self {
            id: parts.id,
            user_id: parts.user_id,
            currency: parts.currency,
            items,
            applied_discounts: parts.applied_discounts,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        })
    }

    /// Returns the storage representation of this cart.
    pub fn to_parts(&self) -> CartParts {
        CartParts {
            id: self.id,
            user_id: self.user_id.clone(),
            currency: self.currency,
            items: self.items.clone(),
            applied_discounts: self.applied_discounts.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// Query methods
impl Cart {
    pub fn id(&self) -> CartId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn currency(&self) -> CurrencyCode {
        self.currency
    }

    /// Returns the cart lines in insertion order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Returns the line for a product, if present.
    pub fn get_item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn applied_discounts(&self) -> &[AppliedDiscount] {
        &self.applied_discounts
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the total quantity across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Sum of all line totals.
    pub fn total_amount(&self) -> Money {
        // Every line is checked on entry for currency and overflow.
        Money::sum(self.currency, self.items.iter().map(CartItem::total_price))
            .unwrap_or_else(|_| Money::zero(self.currency))
    }

    /// Sum of applied discounts, never more than the cart total.
    pub fn discount_total(&self) -> Money {
        let total = self.total_amount();
        let discounts = Money::sum(self.currency, self.applied_discounts.iter().map(|d| d.amount))
            .unwrap_or_else(|_| Money::zero(self.currency));
        discounts.try_min(total).unwrap_or(total)
    }

    /// Cart total minus applied discounts.
    pub fn total_with_discount(&self) -> Money {
        self.total_amount()
            .try_sub(self.discount_total())
            .map(|m| m.clamp_non_negative())
            .unwrap_or_else(|_| self.total_amount())
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// Command methods
impl Cart {
    /// Adds a product to the cart.
    ///
    /// If the product is already in the cart its quantity is increased and
    /// its unit price refreshed to `unit_price`.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<&CartItem, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }
        ensure_currency(self.currency, &unit_price)?;

        let index = match self.items.iter().position(|i| i.product_id == product_id) {
            Some(index) => {
                let item = &self.items[index];
                let merged = item
                    .quantity
                    .checked_add(quantity)
                    .ok_or(MoneyError::Overflow)?;
                let line = item.repriced(merged, unit_price)?;
                self.ensure_total_fits(Some(index), &line)?;
                self.items[index] = line;
                index
            }
            None => {
                let line = CartItem::new(product_id, quantity, unit_price)?;
                self.ensure_total_fits(None, &line)?;
                self.items.push(line);
                self.items.len() - 1
            }
        };

        self.items_changed();
        Ok(&self.items[index])
    }

    /// Sets the quantity of an existing line.
    pub fn update_item_quantity(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }
        let index = self
            .items
            .iter()
            .position(|i| i.product_id == product_id)
            .ok_or(CartError::ItemNotFound { product_id })?;
        let line = self.items[index].repriced(quantity, self.items[index].unit_price)?;
        self.ensure_total_fits(Some(index), &line)?;
        self.items[index] = line;
        self.items_changed();
        Ok(())
    }

    /// Removes a product line.
    pub fn remove_item(&mut self, product_id: ProductId) -> Result<CartItem, CartError> {
        let index = self
            .items
            .iter()
            .position(|i| i.product_id == product_id)
            .ok_or(CartError::ItemNotFound { product_id })?;
        let removed = self.items.remove(index);
        self.items_changed();
        Ok(removed)
    }

    /// Removes every line and applied discount.
    pub fn clear(&mut self) {
        self.items.clear();
        self.items_changed();
    }

    /// Applies a discount amount to the cart.
    pub fn apply_discount(&mut self, discount: AppliedDiscount) -> Result<(), CartError> {
        ensure_currency(self.currency, &discount.amount)?;
        if discount.amount.is_negative() {
            return Err(CartError::InvalidDiscountAmount {
                discount_id: discount.discount_id,
            });
        }
        if self
            .applied_discounts
            .iter()
            .any(|d| d.discount_id == discount.discount_id)
        {
            return Err(CartError::DiscountAlreadyApplied {
                discount_id: discount.discount_id,
            });
        }
        self.applied_discounts.push(discount);
        self.touch();
        Ok(())
    }

    /// Removes all applied discounts, returning how many were removed.
    pub fn clear_discounts(&mut self) -> usize {
        let removed = self.applied_discounts.len();
        self.applied_discounts.clear();
        self.touch();
        removed
    }

    /// Checks that the cart total is still representable with `line` in
    /// place of the line at `replacing`.
    fn ensure_total_fits(
        &self,
        replacing: Option<usize>,
        line: &CartItem,
    ) -> Result<(), CartError> {
        let others = self
            .items
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != replacing)
            .map(|(_, item)| item.total_price);
        Money::sum(self.currency, others.chain([line.total_price]))?;
        Ok(())
    }

    // Discount amounts were computed against the previous total.
    fn items_changed(&mut self) {
        self.applied_discounts.clear();
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn ensure_currency(currency: CurrencyCode, amount: &Money) -> Result<(), MoneyError> {
    if amount.currency() != currency {
        return Err(MoneyError::CurrencyMismatch {
            left: currency,
            right: amount.currency(),
        });
    }
    Ok(())
}
