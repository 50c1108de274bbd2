//! Persistence contracts, one per aggregate.
//!
//! Implementations run inside the transaction of the unit of work that
//! handed them out. Lookups return `Ok(None)` for absent rows; errors are
//! reserved for infrastructure faults.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, DiscountId, OrderId, PaymentId, ProductId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::cart::Cart;
use crate::discount::{Discount, DiscountHistory, DiscountType};
use crate::order::{Order, OrderItem, OrderStatus};
use crate::payment::{PaymentRecord, PaymentStatus, StatusChange};
use crate::product::Product;

/// Errors raised by repository implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The operation observed a cancelled token.
    #[error("Operation cancelled")]
    Cancelled,

    /// The transaction was already committed or rolled back.
    #[error("Transaction is closed")]
    TransactionClosed,

    /// The storage could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A uniqueness or reference constraint was violated.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A stored row failed re-validation.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A page request was out of range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {field}: {message}")]
pub struct InvalidPageRequest {
    pub field: &'static str,
    pub message: &'static str,
}

/// One-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> std::result::Result<Self, InvalidPageRequest> {
        if page == 0 {
            return Err(InvalidPageRequest {
                field: "page",
                message: "must be at least 1",
            });
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(InvalidPageRequest {
                field: "page_size",
                message: "must be between 1 and 100",
            });
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

/// A page of results with the total row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    /// Cuts the requested page out of an already ordered result set.
    pub fn slice(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(request.offset())
            .take(request.page_size() as usize)
            .collect();
        Self {
            items,
            page: request.page(),
            page_size: request.page_size(),
            total,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
        }
    }
}

/// Filter for listing discounts. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountFilter {
    pub is_active: Option<bool>,
    pub discount_type: Option<DiscountType>,
    pub auto_apply: Option<bool>,
    /// Case-insensitive code prefix.
    pub code: Option<String>,
}

impl DiscountFilter {
    pub fn matches(&self, discount: &Discount) -> bool {
        if self.is_active.is_some_and(|active| active != discount.is_active()) {
            return false;
        }
        if self
            .discount_type
            .is_some_and(|kind| kind != discount.discount_type())
        {
            return false;
        }
        if self
            .auto_apply
            .is_some_and(|auto| auto != discount.auto_apply())
        {
            return false;
        }
        if let Some(prefix) = &self.code {
            let prefix = prefix.to_uppercase();
            return discount
                .code()
                .is_some_and(|code| code.starts_with(&prefix));
        }
        true
    }
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn get_cart_by_user(&self, user_id: &UserId, cancel: &CancellationToken)
    -> Result<Option<Cart>>;

    async fn create_cart(&self, cart: &Cart, cancel: &CancellationToken) -> Result<()>;

    /// Replaces the stored cart, items and applied discounts included.
    async fn update_cart(&self, cart: &Cart, cancel: &CancellationToken) -> Result<()>;

    async fn delete_cart(&self, cart_id: CartId, cancel: &CancellationToken) -> Result<()>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get_product_by_id(
        &self,
        product_id: ProductId,
        cancel: &CancellationToken,
    ) -> Result<Option<Product>>;

    /// Lists products ordered by name.
    async fn list_products(
        &self,
        request: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<Product>>;

    async fn create_product(&self, product: &Product, cancel: &CancellationToken) -> Result<()>;

    async fn update_product(&self, product: &Product, cancel: &CancellationToken) -> Result<()>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Writes the order header. Items are written with `create_order_item`.
    async fn create_order(&self, order: &Order, cancel: &CancellationToken) -> Result<()>;

    async fn create_order_item(
        &self,
        order_id: OrderId,
        item: &OrderItem,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn get_order_by_id(
        &self,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Option<Order>>;

    /// Orders of one user, newest first.
    async fn get_orders_by_user(
        &self,
        user_id: &UserId,
        request: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<Order>>;

    async fn get_latest_order_for_user(
        &self,
        user_id: &UserId,
        cancel: &CancellationToken,
    ) -> Result<Option<Order>>;

    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn count_orders(&self, cancel: &CancellationToken) -> Result<u64>;
}

#[async_trait]
pub trait DiscountRepository: Send + Sync {
    async fn get_discount_by_id(
        &self,
        discount_id: DiscountId,
        cancel: &CancellationToken,
    ) -> Result<Option<Discount>>;

    /// Looks a discount up by its code, ignoring case.
    async fn get_discount_by_code(
        &self,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Discount>>;

    async fn list_discounts(
        &self,
        filter: &DiscountFilter,
        request: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<Discount>>;

    /// Active auto-apply discounts whose validity window contains `now`.
    async fn get_auto_apply_candidates(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Discount>>;

    async fn create_discount(&self, discount: &Discount, cancel: &CancellationToken)
    -> Result<()>;

    async fn update_discount(&self, discount: &Discount, cancel: &CancellationToken)
    -> Result<()>;

    async fn delete_discount(
        &self,
        discount_id: DiscountId,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn create_discount_history(
        &self,
        history: &DiscountHistory,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn get_history_by_order(
        &self,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Vec<DiscountHistory>>;

    /// How many orders of `customer_id` used the discount.
    async fn count_customer_usage(
        &self,
        discount_id: DiscountId,
        customer_id: &UserId,
        cancel: &CancellationToken,
    ) -> Result<u32>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Writes the payment row. History rows are written separately.
    async fn create_payment(&self, payment: &PaymentRecord, cancel: &CancellationToken)
    -> Result<()>;

    async fn create_payment_status_history(
        &self,
        payment_id: PaymentId,
        change: &StatusChange,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn get_payment_by_id(
        &self,
        payment_id: PaymentId,
        cancel: &CancellationToken,
    ) -> Result<Option<PaymentRecord>>;

    async fn get_payments_by_order(
        &self,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Vec<PaymentRecord>>;

    async fn update_payment_status(
        &self,
        payment_id: PaymentId,
        status: PaymentStatus,
        cancel: &CancellationToken,
    ) -> Result<()>;
}
