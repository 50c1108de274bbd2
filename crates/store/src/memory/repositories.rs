//! Repository implementations over the in-memory tables.

use std::fmt::Display;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, DiscountId, OrderId, PaymentId, ProductId, UserId};
use domain::order::OrderParts;
use domain::repository::Result;
use domain::{
    Cart, CartRepository, Discount, DiscountFilter, DiscountHistory, DiscountRepository, Order,
    OrderItem, OrderRepository, OrderStatus, Page, PageRequest, PaymentRecord, PaymentRepository,
    PaymentStatus, Product, ProductRepository, RepositoryError, StatusChange,
};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::{Faults, InMemoryBackend, MemoryTransaction, Tables};
use crate::{Repository, TransactionCell};

/// What every repository handle holds: the tables and the shared cell.
#[derive(Clone)]
struct Binding {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Mutex<Faults>>,
    cell: TransactionCell<InMemoryBackend>,
}

impl Binding {
    fn new(backend: &InMemoryBackend, cell: TransactionCell<InMemoryBackend>) -> Self {
        Self {
            tables: Arc::clone(&backend.tables),
            faults: Arc::clone(&backend.faults),
            cell,
        }
    }

    /// Runs `f` against the open transaction and the committed tables.
    async fn with_tx<T>(
        &self,
        cancel: &CancellationToken,
        f: impl FnOnce(&mut MemoryTransaction, &Tables) -> Result<T>,
    ) -> Result<T> {
        if cancel.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }
        let mut slot = self.cell.lock().await;
        let tx = slot.as_mut().ok_or(RepositoryError::TransactionClosed)?;
        let tables = self.tables.read().await;
        f(tx, &*tables)
    }

    fn check_fault(&self, probe: impl FnOnce(&Faults) -> bool, what: &str) -> Result<()> {
        let faults = self
            .faults
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if probe(&faults) {
            return Err(RepositoryError::Connection(format!(
                "injected failure: {what}"
            )));
        }
        Ok(())
    }
}

fn corrupt(err: impl Display) -> RepositoryError {
    RepositoryError::Corrupt(err.to_string())
}

macro_rules! memory_repository {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(Binding);

        impl Repository<InMemoryBackend> for $name {
            fn bind(backend: &InMemoryBackend, cell: TransactionCell<InMemoryBackend>) -> Self {
                Self(Binding::new(backend, cell))
            }
        }
    };
}

memory_repository!(
    /// Carts, one per user.
    MemoryCarts
);
memory_repository!(MemoryProducts);
memory_repository!(
    /// Order headers and their item rows.
    MemoryOrders
);
memory_repository!(
    /// Discounts and their usage history.
    MemoryDiscounts
);
memory_repository!(
    /// Payment rows and their status history.
    MemoryPayments
);

#[async_trait]
impl CartRepository for MemoryCarts {
    async fn get_cart_by_user(
        &self,
        user_id: &UserId,
        cancel: &CancellationToken,
    ) -> Result<Option<Cart>> {
        self.0
            .with_tx(cancel, |tx, tables| {
                tx.carts
                    .values(&tables.carts)
                    .into_iter()
                    .find(|parts| &parts.user_id == user_id)
                    .map(Cart::from_parts)
                    .transpose()
                    .map_err(corrupt)
            })
            .await
    }

    async fn create_cart(&self, cart: &Cart, cancel: &CancellationToken) -> Result<()> {
        self.0
            .with_tx(cancel, |tx, tables| {
                let taken = tx
                    .carts
                    .values(&tables.carts)
                    .iter()
                    .any(|parts| &parts.user_id == cart.user_id());
                if taken {
                    return Err(RepositoryError::Constraint(format!(
                        "user {} already has a cart",
                        cart.user_id()
                    )));
                }
                tx.carts.put(cart.id(), cart.to_parts());
                Ok(())
            })
            .await
    }

    async fn update_cart(&self, cart: &Cart, cancel: &CancellationToken) -> Result<()> {
        self.0
            .with_tx(cancel, |tx, tables| {
                if !tx.carts.contains(&cart.id(), &tables.carts) {
                    return Err(RepositoryError::Constraint(format!(
                        "cart {} does not exist",
                        cart.id()
                    )));
                }
                tx.carts.put(cart.id(), cart.to_parts());
                Ok(())
            })
            .await
    }

    async fn delete_cart(&self, cart_id: CartId, cancel: &CancellationToken) -> Result<()> {
        self.0
            .with_tx(cancel, |tx, _| {
                tx.carts.delete(cart_id);
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl ProductRepository for MemoryProducts {
    async fn get_product_by_id(
        &self,
        product_id: ProductId,
        cancel: &CancellationToken,
    ) -> Result<Option<Product>> {
        self.0.check_fault(
            |faults| faults.product_lookups.contains(&product_id),
            "product lookup",
        )?;
        self.0
            .with_tx(cancel, |tx, tables| {
                tx.products
                    .get(&product_id, &tables.products)
                    .map(Product::from_parts)
                    .transpose()
                    .map_err(corrupt)
            })
            .await
    }

    async fn list_products(
        &self,
        request: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<Product>> {
        self.0
            .with_tx(cancel, |tx, tables| {
                let mut products = tx
                    .products
                    .values(&tables.products)
                    .into_iter()
                    .map(Product::from_parts)
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(corrupt)?;
                products.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));
                Ok(Page::slice(products, request))
            })
            .await
    }

    async fn create_product(&self, product: &Product, cancel: &CancellationToken) -> Result<()> {
        self.0
            .with_tx(cancel, |tx, tables| {
                if tx.products.contains(&product.id(), &tables.products) {
                    return Err(RepositoryError::Constraint(format!(
                        "product {} already exists",
                        product.id()
                    )));
                }
                tx.products.put(product.id(), product.to_parts());
                Ok(())
            })
            .await
    }

    async fn update_product(&self, product: &Product, cancel: &CancellationToken) -> Result<()> {
        self.0
            .with_tx(cancel, |tx, tables| {
                if !tx.products.contains(&product.id(), &tables.products) {
                    return Err(RepositoryError::Constraint(format!(
                        "product {} does not exist",
                        product.id()
                    )));
                }
                tx.products.put(product.id(), product.to_parts());
                Ok(())
            })
            .await
    }
}

/// Joins an order header with its item rows, staged rows last.
fn assemble_order(
    mut header: OrderParts,
    tx: &MemoryTransaction,
    tables: &Tables,
) -> Result<Order> {
    header.items = tables
        .order_items
        .iter()
        .chain(tx.order_items.iter())
        .filter(|(order_id, _)| *order_id == header.id)
        .map(|(_, item)| item.clone())
        .collect();
    Order::from_parts(header).map_err(corrupt)
}

fn user_orders(user_id: &UserId, tx: &MemoryTransaction, tables: &Tables) -> Vec<OrderParts> {
    let mut headers: Vec<_> = tx
        .orders
        .values(&tables.orders)
        .into_iter()
        .filter(|header| &header.user_id == user_id)
        .collect();
    headers.sort_by(|a, b| b.order_date.cmp(&a.order_date));
    headers
}

#[async_trait]
impl OrderRepository for MemoryOrders {
    async fn create_order(&self, order: &Order, cancel: &CancellationToken) -> Result<()> {
        self.0
            .with_tx(cancel, |tx, tables| {
                if tx.orders.contains(&order.id(), &tables.orders) {
                    return Err(RepositoryError::Constraint(format!(
                        "order {} already exists",
                        order.id()
                    )));
                }
                let mut header = order.to_parts();
                header.items.clear();
                tx.orders.put(order.id(), header);
                Ok(())
            })
            .await
    }

    async fn create_order_item(
        &self,
        order_id: OrderId,
        item: &OrderItem,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.0
            .check_fault(|faults| faults.order_item_insert, "order item insert")?;
        self.0
            .with_tx(cancel, |tx, tables| {
                if !tx.orders.contains(&order_id, &tables.orders) {
                    return Err(RepositoryError::Constraint(format!(
                        "order {order_id} does not exist"
                    )));
                }
                tx.order_items.push((order_id, item.clone()));
                Ok(())
            })
            .await
    }

    async fn get_order_by_id(
        &self,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Option<Order>> {
        self.0
            .with_tx(cancel, |tx, tables| {
                tx.orders
                    .get(&order_id, &tables.orders)
                    .map(|header| assemble_order(header, tx, tables))
                    .transpose()
            })
            .await
    }

    async fn get_orders_by_user(
        &self,
        user_id: &UserId,
        request: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<Order>> {
        self.0
            .with_tx(cancel, |tx, tables| {
                let page = Page::slice(user_orders(user_id, tx, tables), request);
                let items = page
                    .items
                    .into_iter()
                    .map(|header| assemble_order(header, tx, tables))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Page {
                    items,
                    page: page.page,
                    page_size: page.page_size,
                    total: page.total,
                })
            })
            .await
    }

    async fn get_latest_order_for_user(
        &self,
        user_id: &UserId,
        cancel: &CancellationToken,
    ) -> Result<Option<Order>> {
        self.0
            .with_tx(cancel, |tx, tables| {
                user_orders(user_id, tx, tables)
                    .into_iter()
                    .next()
                    .map(|header| assemble_order(header, tx, tables))
                    .transpose()
            })
            .await
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.0
            .with_tx(cancel, |tx, tables| {
                let mut header = tx.orders.get(&order_id, &tables.orders).ok_or_else(|| {
                    RepositoryError::Constraint(format!("order {order_id} does not exist"))
                })?;
                header.status = status;
                tx.orders.put(order_id, header);
                Ok(())
            })
            .await
    }

    async fn count_orders(&self, cancel: &CancellationToken) -> Result<u64> {
        self.0
            .with_tx(cancel, |tx, tables| {
                Ok(tx.orders.values(&tables.orders).len() as u64)
            })
            .await
    }
}

fn visible_discounts(tx: &MemoryTransaction, tables: &Tables) -> Result<Vec<Discount>> {
    tx.discounts
        .values(&tables.discounts)
        .into_iter()
        .map(Discount::from_parts)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(corrupt)
}

#[async_trait]
impl DiscountRepository for MemoryDiscounts {
    async fn get_discount_by_id(
        &self,
        discount_id: DiscountId,
        cancel: &CancellationToken,
    ) -> Result<Option<Discount>> {
        self.0
            .with_tx(cancel, |tx, tables| {
                tx.discounts
                    .get(&discount_id, &tables.discounts)
                    .map(Discount::from_parts)
                    .transpose()
                    .map_err(corrupt)
            })
            .await
    }

    async fn get_discount_by_code(
        &self,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Discount>> {
        let code = code.trim().to_uppercase();
        self.0
            .with_tx(cancel, |tx, tables| {
                Ok(visible_discounts(tx, tables)?
                    .into_iter()
                    .find(|discount| discount.code() == Some(code.as_str())))
            })
            .await
    }

    async fn list_discounts(
        &self,
        filter: &DiscountFilter,
        request: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<Discount>> {
        self.0
            .with_tx(cancel, |tx, tables| {
                let mut discounts: Vec<_> = visible_discounts(tx, tables)?
                    .into_iter()
                    .filter(|discount| filter.matches(discount))
                    .collect();
                discounts.sort_by(|a, b| {
                    a.created_at()
                        .cmp(&b.created_at())
                        .then(a.id().cmp(&b.id()))
                });
                Ok(Page::slice(discounts, request))
            })
            .await
    }

    async fn get_auto_apply_candidates(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Discount>> {
        self.0
            .with_tx(cancel, |tx, tables| {
                let mut candidates: Vec<_> = visible_discounts(tx, tables)?
                    .into_iter()
                    .filter(|discount| discount.auto_apply() && discount.is_valid_at(now))
                    .collect();
                candidates.sort_by(|a, b| {
                    a.created_at()
                        .cmp(&b.created_at())
                        .then(a.id().cmp(&b.id()))
                });
                Ok(candidates)
            })
            .await
    }

    async fn create_discount(
        &self,
        discount: &Discount,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.0
            .with_tx(cancel, |tx, tables| {
                let duplicate_code = discount.code().is_some()
                    && visible_discounts(tx, tables)?
                        .iter()
                        .any(|existing| existing.code() == discount.code());
                if duplicate_code {
                    return Err(RepositoryError::Constraint(format!(
                        "discount code {} is taken",
                        discount.code().unwrap_or_default()
                    )));
                }
                tx.discounts.put(discount.id(), discount.to_parts());
                Ok(())
            })
            .await
    }

    async fn update_discount(
        &self,
        discount: &Discount,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.0
            .with_tx(cancel, |tx, tables| {
                if !tx.discounts.contains(&discount.id(), &tables.discounts) {
                    return Err(RepositoryError::Constraint(format!(
                        "discount {} does not exist",
                        discount.id()
                    )));
                }
                tx.discounts.put(discount.id(), discount.to_parts());
                Ok(())
            })
            .await
    }

    async fn delete_discount(
        &self,
        discount_id: DiscountId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.0
            .with_tx(cancel, |tx, _| {
                tx.discounts.delete(discount_id);
                Ok(())
            })
            .await
    }

    async fn create_discount_history(
        &self,
        history: &DiscountHistory,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.0
            .with_tx(cancel, |tx, _| {
                tx.discount_history.push(history.clone());
                Ok(())
            })
            .await
    }

    async fn get_history_by_order(
        &self,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Vec<DiscountHistory>> {
        self.0
            .with_tx(cancel, |tx, tables| {
                Ok(tables
                    .discount_history
                    .iter()
                    .chain(tx.discount_history.iter())
                    .filter(|row| row.order_id == order_id)
                    .cloned()
                    .collect())
            })
            .await
    }

    async fn count_customer_usage(
        &self,
        discount_id: DiscountId,
        customer_id: &UserId,
        cancel: &CancellationToken,
    ) -> Result<u32> {
        self.0
            .with_tx(cancel, |tx, tables| {
                let uses = tables
                    .discount_history
                    .iter()
                    .chain(tx.discount_history.iter())
                    .filter(|row| row.discount_id == discount_id && &row.customer_id == customer_id)
                    .count();
                Ok(u32::try_from(uses).unwrap_or(u32::MAX))
            })
            .await
    }
}

fn assemble_payment(
    mut parts: domain::payment::PaymentParts,
    tx: &MemoryTransaction,
    tables: &Tables,
) -> Result<PaymentRecord> {
    parts.status_history = tables
        .payment_history
        .iter()
        .chain(tx.payment_history.iter())
        .filter(|(payment_id, _)| *payment_id == parts.id)
        .map(|(_, change)| change.clone())
        .collect();
    PaymentRecord::from_parts(parts).map_err(corrupt)
}

#[async_trait]
impl PaymentRepository for MemoryPayments {
    async fn create_payment(
        &self,
        payment: &PaymentRecord,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.0
            .check_fault(|faults| faults.payment_insert, "payment insert")?;
        self.0
            .with_tx(cancel, |tx, tables| {
                if tx.payments.contains(&payment.id(), &tables.payments) {
                    return Err(RepositoryError::Constraint(format!(
                        "payment {} already exists",
                        payment.id()
                    )));
                }
                let mut row = payment.to_parts();
                row.status_history.clear();
                tx.payments.put(payment.id(), row);
                Ok(())
            })
            .await
    }

    async fn create_payment_status_history(
        &self,
        payment_id: PaymentId,
        change: &StatusChange,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.0
            .with_tx(cancel, |tx, tables| {
                if !tx.payments.contains(&payment_id, &tables.payments) {
                    return Err(RepositoryError::Constraint(format!(
                        "payment {payment_id} does not exist"
                    )));
                }
                tx.payment_history.push((payment_id, change.clone()));
                Ok(())
            })
            .await
    }

    async fn get_payment_by_id(
        &self,
        payment_id: PaymentId,
        cancel: &CancellationToken,
    ) -> Result<Option<PaymentRecord>> {
        self.0
            .with_tx(cancel, |tx, tables| {
                tx.payments
                    .get(&payment_id, &tables.payments)
                    .map(|parts| assemble_payment(parts, tx, tables))
                    .transpose()
            })
            .await
    }

    async fn get_payments_by_order(
        &self,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Vec<PaymentRecord>> {
        self.0
            .with_tx(cancel, |tx, tables| {
                let mut rows: Vec<_> = tx
                    .payments
                    .values(&tables.payments)
                    .into_iter()
                    .filter(|parts| parts.order_id == order_id)
                    .collect();
                rows.sort_by(|a, b| a.processed_at.cmp(&b.processed_at));
                rows.into_iter()
                    .map(|parts| assemble_payment(parts, tx, tables))
                    .collect()
            })
            .await
    }

    async fn update_payment_status(
        &self,
        payment_id: PaymentId,
        status: PaymentStatus,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.0
            .with_tx(cancel, |tx, tables| {
                let mut row = tx
                    .payments
                    .get(&payment_id, &tables.payments)
                    .ok_or_else(|| {
                        RepositoryError::Constraint(format!("payment {payment_id} does not exist"))
                    })?;
                row.status = status;
                tx.payments.put(payment_id, row);
                Ok(())
            })
            .await
    }
}
