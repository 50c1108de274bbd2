//! In-memory storage backend.
//!
//! Committed rows live behind a `RwLock`. Every transaction stages its
//! writes in an overlay that is applied on commit and dropped on rollback,
//! so readers never observe uncommitted work from another unit of work.
//! Concurrent transactions touching the same row resolve last writer wins.

mod overlay;
mod repositories;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use common::{CartId, DiscountId, OrderId, PaymentId, ProductId, UserId};
use domain::cart::CartParts;
use domain::discount::DiscountParts;
use domain::order::OrderParts;
use domain::payment::PaymentParts;
use domain::product::ProductParts;
use domain::{Cart, Discount, DiscountHistory, OrderItem, Product, StatusChange};
use tokio::sync::RwLock;

use crate::{Backend, Persistence, Result, StoreError};

pub use repositories::{MemoryCarts, MemoryDiscounts, MemoryOrders, MemoryPayments, MemoryProducts};

use overlay::Overlay;

#[derive(Debug, Default)]
pub(crate) struct Tables {
    carts: HashMap<CartId, CartParts>,
    products: HashMap<ProductId, ProductParts>,
    orders: HashMap<OrderId, OrderParts>,
    order_items: Vec<(OrderId, OrderItem)>,
    discounts: HashMap<DiscountId, DiscountParts>,
    discount_history: Vec<DiscountHistory>,
    payments: HashMap<PaymentId, PaymentParts>,
    payment_history: Vec<(PaymentId, StatusChange)>,
}

/// Writes staged by one transaction.
#[derive(Debug, Default)]
pub struct MemoryTransaction {
    carts: Overlay<CartId, CartParts>,
    products: Overlay<ProductId, ProductParts>,
    orders: Overlay<OrderId, OrderParts>,
    order_items: Vec<(OrderId, OrderItem)>,
    discounts: Overlay<DiscountId, DiscountParts>,
    discount_history: Vec<DiscountHistory>,
    payments: Overlay<PaymentId, PaymentParts>,
    payment_history: Vec<(PaymentId, StatusChange)>,
}

impl MemoryTransaction {
    /// Returns true if nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.carts.is_empty()
            && self.products.is_empty()
            && self.orders.is_empty()
            && self.order_items.is_empty()
            && self.discounts.is_empty()
            && self.discount_history.is_empty()
            && self.payments.is_empty()
            && self.payment_history.is_empty()
    }

    fn apply(self, tables: &mut Tables) {
        self.carts.apply(&mut tables.carts);
        self.products.apply(&mut tables.products);
        self.orders.apply(&mut tables.orders);
        tables.order_items.extend(self.order_items);
        self.discounts.apply(&mut tables.discounts);
        tables.discount_history.extend(self.discount_history);
        self.payments.apply(&mut tables.payments);
        tables.payment_history.extend(self.payment_history);
    }
}

/// Failures the backend injects for tests.
#[derive(Debug, Default)]
pub(crate) struct Faults {
    product_lookups: HashSet<ProductId>,
    order_item_insert: bool,
    payment_insert: bool,
    commit: bool,
}

/// Storage backend that keeps every table in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Mutex<Faults>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every lookup of `product_id` fail with a connection error.
    pub fn fail_product_lookup(&self, product_id: ProductId) {
        self.faults().product_lookups.insert(product_id);
    }

    /// Makes `create_order_item` fail with a connection error.
    pub fn fail_order_item_insert(&self, fail: bool) {
        self.faults().order_item_insert = fail;
    }

    /// Makes `create_payment` fail with a connection error.
    pub fn fail_payment_insert(&self, fail: bool) {
        self.faults().payment_insert = fail;
    }

    /// Makes every commit fail, discarding the transaction.
    pub fn fail_commit(&self, fail: bool) {
        self.faults().commit = fail;
    }

    pub fn clear_faults(&self) {
        *self.faults() = Faults::default();
    }

    /// Writes a product straight into the committed tables.
    pub async fn seed_product(&self, product: &Product) {
        self.tables
            .write()
            .await
            .products
            .insert(product.id(), product.to_parts());
    }

    /// Writes a discount straight into the committed tables.
    pub async fn seed_discount(&self, discount: &Discount) {
        self.tables
            .write()
            .await
            .discounts
            .insert(discount.id(), discount.to_parts());
    }

    /// Number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Number of committed payments.
    pub async fn payment_count(&self) -> usize {
        self.tables.read().await.payments.len()
    }

    /// Number of committed discount history rows.
    pub async fn discount_history_count(&self) -> usize {
        self.tables.read().await.discount_history.len()
    }

    /// The committed state of a product.
    pub async fn product(&self, product_id: ProductId) -> Option<Product> {
        let tables = self.tables.read().await;
        let parts = tables.products.get(&product_id)?.clone();
        Product::from_parts(parts).ok()
    }

    /// The committed state of a discount.
    pub async fn discount(&self, discount_id: DiscountId) -> Option<Discount> {
        let tables = self.tables.read().await;
        let parts = tables.discounts.get(&discount_id)?.clone();
        Discount::from_parts(parts).ok()
    }

    /// The committed cart of a user.
    pub async fn cart_of(&self, user_id: &UserId) -> Option<Cart> {
        let tables = self.tables.read().await;
        let parts = tables
            .carts
            .values()
            .find(|parts| &parts.user_id == user_id)?
            .clone();
        Cart::from_parts(parts).ok()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction> {
        Ok(MemoryTransaction::default())
    }

    async fn commit(&self, tx: MemoryTransaction) -> Result<()> {
        if self.faults().commit {
            return Err(StoreError::Backend("injected commit failure".to_string()));
        }
        let mut tables = self.tables.write().await;
        tx.apply(&mut tables);
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTransaction) -> Result<()> {
        drop(tx);
        Ok(())
    }
}

impl Persistence for InMemoryBackend {
    type Carts = MemoryCarts;
    type Products = MemoryProducts;
    type Orders = MemoryOrders;
    type Discounts = MemoryDiscounts;
    type Payments = MemoryPayments;
}
