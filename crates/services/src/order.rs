//! Order placement and order lifecycle.

use std::sync::Arc;

use chrono::Utc;
use common::{Money, OrderId, UserId};
use domain::{
    Address, CartRepository, Discount, DiscountHistory, DiscountRepository, Order,
    OrderItem, OrderRepository, OrderStatus, Page, PageRequest, ProductRepository,
};
use serde::{Deserialize, Serialize};
use store::{Persistence, UnitOfWork};
use tokio_util::sync::CancellationToken;

use crate::cart::non_empty_cart;
use crate::transaction::finish;
use crate::{DiscountService, Notification, Notifier, Result, ServiceError};

/// Where an order ships and who is billed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub shipping_address: Address,
    pub billing_address: Address,
}

/// Turns carts into orders.
///
/// Placing an order decrements stock for every line, counts the use of each
/// applied discount and empties the cart. Any failure undoes all of it.
pub struct OrderService<P: Persistence> {
    backend: P,
    discounts: DiscountService<P>,
    notifier: Arc<dyn Notifier>,
}

impl<P: Persistence> OrderService<P> {
    pub fn new(backend: P, discounts: DiscountService<P>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            discounts,
            notifier,
        }
    }

    /// Places an order for the contents of the user's cart.
    #[tracing::instrument(skip(self, shipping, cancel), fields(user_id = %user_id))]
    pub async fn place_order(
        &self,
        user_id: &UserId,
        shipping: &ShippingDetails,
        cancel: &CancellationToken,
    ) -> Result<OrderId> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = self
            .place_order_in(&uow, user_id, shipping, cancel)
            .await
            .map(|order| order.id());
        finish(uow, cancel, result).await
    }

    /// Places the order inside `uow`.
    ///
    /// Commits at the end unless an outer transaction handler controls the
    /// unit of work, in which case the commit is left to the handler.
    pub(crate) async fn place_order_in(
        &self,
        uow: &UnitOfWork<P>,
        user_id: &UserId,
        shipping: &ShippingDetails,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        let mut cart = non_empty_cart(uow, user_id, cancel).await?;

        let mut items = Vec::with_capacity(cart.items().len());
        for line in cart.items() {
            let mut product = uow
                .products()
                .get_product_by_id(line.product_id(), cancel)
                .await?
                .ok_or_else(|| ServiceError::not_found(format!("Product {}", line.product_id())))?;
            if !product.is_purchasable() {
                return Err(ServiceError::Conflict(format!(
                    "Product {} is not available ({})",
                    product.name(),
                    product.status()
                )));
            }
            if !product.decrement_stock(line.quantity()) {
                return Err(ServiceError::Conflict(format!(
                    "Insufficient stock for {}: requested {}, available {}",
                    product.name(),
                    line.quantity(),
                    product.stock()
                )));
            }
            uow.products().update_product(&product, cancel).await?;
            items.push(OrderItem::new(
                product.id(),
                product.name(),
                line.quantity(),
                line.unit_price(),
            ));
        }

        let now = Utc::now();
        let mut redeemed: Vec<(Discount, Money)> = Vec::new();
        for applied in cart.applied_discounts() {
            let discount = self
                .discounts
                .redeem_in(uow, applied.discount_id, user_id, now, cancel)
                .await?;
            redeemed.push((discount, applied.amount));
        }

        let order = Order::create(
            user_id.clone(),
            shipping.shipping_address.clone(),
            shipping.billing_address.clone(),
            items,
            cart.discount_total(),
        )?;
        let orders = uow.orders();
        orders.create_order(&order, cancel).await?;
        for item in order.items() {
            orders.create_order_item(order.id(), item, cancel).await?;
        }

        // History amounts add up to the discount the order actually received.
        let mut remaining = order.discount_total();
        for (discount, amount) in &redeemed {
            let allocated = amount.try_min(remaining)?;
            remaining = remaining.try_sub(allocated)?;
            let history = DiscountHistory::record(discount, order.id(), user_id.clone(), allocated);
            uow.discounts()
                .create_discount_history(&history, cancel)
                .await?;
        }

        cart.clear();
        uow.carts().update_cart(&cart, cancel).await?;

        uow.commit(cancel, false).await?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(
            order_id = %order.id(),
            items = order.item_count(),
            total = %order.total_amount(),
            "Order placed"
        );
        Ok(order)
    }

    /// Returns one of the user's orders.
    #[tracing::instrument(skip(self, cancel), fields(user_id = %user_id))]
    pub async fn get_order(
        &self,
        user_id: &UserId,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = owned_order(&uow, user_id, order_id, cancel).await;
        finish(uow, cancel, result).await
    }

    /// Lists the user's orders, newest first.
    #[tracing::instrument(skip(self, cancel), fields(user_id = %user_id))]
    pub async fn list_orders_for_user(
        &self,
        user_id: &UserId,
        request: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<Order>> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = uow
            .orders()
            .get_orders_by_user(user_id, request, cancel)
            .await
            .map_err(ServiceError::from);
        finish(uow, cancel, result).await
    }

    /// Moves an order along its status machine.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = async {
            let mut order = load(&uow, order_id, cancel).await?;
            order.transition_to(status)?;
            uow.orders()
                .update_order_status(order_id, status, cancel)
                .await?;
            Ok::<_, ServiceError>(order)
        }
        .await;
        finish(uow, cancel, result).await
    }

    /// Cancels one of the user's orders and returns its units to stock.
    #[tracing::instrument(skip(self, cancel), fields(user_id = %user_id))]
    pub async fn cancel_order(
        &self,
        user_id: &UserId,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = self.cancel_order_in(&uow, user_id, order_id, cancel).await;
        let order = finish(uow, cancel, result).await?;

        self.notifier
            .notify(Notification::OrderCancelled {
                user_id: user_id.clone(),
                order_id,
            })
            .await;
        Ok(order)
    }

    async fn cancel_order_in(
        &self,
        uow: &UnitOfWork<P>,
        user_id: &UserId,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        let mut order = owned_order(uow, user_id, order_id, cancel).await?;
        order.cancel()?;

        for item in order.items() {
            match uow
                .products()
                .get_product_by_id(item.product_id, cancel)
                .await?
            {
                Some(mut product) => {
                    product.increment_stock(item.quantity);
                    uow.products().update_product(&product, cancel).await?;
                }
                None => tracing::warn!(
                    product_id = %item.product_id,
                    "Product no longer exists; stock not restored"
                ),
            }
        }
        uow.orders()
            .update_order_status(order_id, order.status(), cancel)
            .await?;

        tracing::info!(order_id = %order_id, "Order cancelled");
        Ok(order)
    }
}

async fn load<P: Persistence>(
    uow: &UnitOfWork<P>,
    order_id: OrderId,
    cancel: &CancellationToken,
) -> Result<Order> {
    uow.orders()
        .get_order_by_id(order_id, cancel)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("Order {order_id}")))
}

/// Loads an order and checks that it belongs to `user_id`.
pub(crate) async fn owned_order<P: Persistence>(
    uow: &UnitOfWork<P>,
    user_id: &UserId,
    order_id: OrderId,
    cancel: &CancellationToken,
) -> Result<Order> {
    let order = load(uow, order_id, cancel).await?;
    if order.user_id() != user_id {
        return Err(ServiceError::Unauthorized(format!(
            "Order {order_id} belongs to another user"
        )));
    }
    Ok(order)
}
