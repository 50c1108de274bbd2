//! Discount definitions and their application to carts.
//!
//! Discounts are applied to a cart first, with the amount computed against
//! the cart at that moment. Usage is only counted when an order is placed,
//! through [`DiscountService::redeem_in`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{CategoryId, DiscountId, OrderId, UserId};
use domain::{
    AppliedDiscount, Cart, CartRepository, Discount, DiscountFilter, DiscountHistory,
    DiscountRepository, NewDiscount, Page, PageRequest, ProductRepository,
};
use store::{Persistence, UnitOfWork};
use tokio_util::sync::CancellationToken;

use crate::cart::{existing_cart, non_empty_cart};
use crate::transaction::finish;
use crate::{Result, ServiceError};

pub struct DiscountService<P: Persistence> {
    backend: P,
}

impl<P: Persistence> Clone for DiscountService<P> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl<P: Persistence> DiscountService<P> {
    pub fn new(backend: P) -> Self {
        Self { backend }
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn list_discounts(
        &self,
        filter: &DiscountFilter,
        request: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<Discount>> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = uow
            .discounts()
            .list_discounts(filter, request, cancel)
            .await
            .map_err(ServiceError::from);
        finish(uow, cancel, result).await
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn get_discount(
        &self,
        discount_id: DiscountId,
        cancel: &CancellationToken,
    ) -> Result<Discount> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = load(&uow, discount_id, cancel).await;
        finish(uow, cancel, result).await
    }

    /// Returns the discounts recorded against an order.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn get_history_by_order(
        &self,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Vec<DiscountHistory>> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = uow
            .discounts()
            .get_history_by_order(order_id, cancel)
            .await
            .map_err(ServiceError::from);
        finish(uow, cancel, result).await
    }

    /// Automatic discounts the user's current cart qualifies for.
    #[tracing::instrument(skip(self, cancel), fields(user_id = %user_id))]
    pub async fn get_applicable_discounts(
        &self,
        user_id: &UserId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Discount>> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = self
            .applicable_in(&uow, user_id, Utc::now(), cancel)
            .await;
        finish(uow, cancel, result).await
    }

    async fn applicable_in(
        &self,
        uow: &UnitOfWork<P>,
        user_id: &UserId,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Discount>> {
        let Some(cart) = uow.carts().get_cart_by_user(user_id, cancel).await? else {
            return Ok(Vec::new());
        };
        if cart.is_empty() {
            return Ok(Vec::new());
        }
        let categories = cart_categories(uow, &cart, cancel).await?;

        let mut applicable = Vec::new();
        for discount in uow.discounts().get_auto_apply_candidates(now, cancel).await? {
            if !discount.is_eligible(cart.total_amount(), &categories, now) {
                continue;
            }
            let used = uow
                .discounts()
                .count_customer_usage(discount.id(), user_id, cancel)
                .await?;
            if discount.ensure_customer_allowance(used).is_ok() {
                applicable.push(discount);
            }
        }
        Ok(applicable)
    }

    /// Creates a discount. Coupon codes are unique, ignoring case.
    #[tracing::instrument(skip(self, new, cancel), fields(discount_type = %new.discount_type))]
    pub async fn create_discount(
        &self,
        new: NewDiscount,
        cancel: &CancellationToken,
    ) -> Result<Discount> {
        let discount = Discount::create(new, Utc::now())?;
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = async {
            if let Some(code) = discount.code()
                && uow
                    .discounts()
                    .get_discount_by_code(code, cancel)
                    .await?
                    .is_some()
            {
                return Err(ServiceError::Conflict(format!(
                    "Discount code {code} already exists"
                )));
            }
            uow.discounts().create_discount(&discount, cancel).await?;
            Ok(())
        }
        .await;
        finish(uow, cancel, result).await?;

        tracing::info!(discount_id = %discount.id(), "Discount created");
        Ok(discount)
    }

    /// Counts one use outside of checkout.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn increment_usage(
        &self,
        discount_id: DiscountId,
        cancel: &CancellationToken,
    ) -> Result<Discount> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = async {
            let mut discount = load(&uow, discount_id, cancel).await?;
            self.increment_usage_in(&uow, &mut discount, cancel).await?;
            Ok::<_, ServiceError>(discount)
        }
        .await;
        finish(uow, cancel, result).await
    }

    /// Counts one use and deactivates the discount when that use was the
    /// last one allowed. Both changes land in the same write.
    pub(crate) async fn increment_usage_in(
        &self,
        uow: &UnitOfWork<P>,
        discount: &mut Discount,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let outcome = discount.increment_usage()?;
        if outcome.reached_limit {
            discount.deactivate();
            tracing::info!(
                discount_id = %discount.id(),
                uses = outcome.uses,
                "Discount reached its usage limit and was deactivated"
            );
        }
        uow.discounts().update_discount(discount, cancel).await?;
        metrics::counter!("discount_usage_total").increment(1);
        Ok(())
    }

    /// Re-checks an applied discount at order time and counts the use.
    pub(crate) async fn redeem_in(
        &self,
        uow: &UnitOfWork<P>,
        discount_id: DiscountId,
        customer_id: &UserId,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Discount> {
        let mut discount = load(uow, discount_id, cancel).await?;
        discount.ensure_usable_at(now)?;
        let used = uow
            .discounts()
            .count_customer_usage(discount_id, customer_id, cancel)
            .await?;
        discount.ensure_customer_allowance(used)?;
        self.increment_usage_in(uow, &mut discount, cancel).await?;
        Ok(discount)
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn deactivate(
        &self,
        discount_id: DiscountId,
        cancel: &CancellationToken,
    ) -> Result<Discount> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = async {
            let mut discount = load(&uow, discount_id, cancel).await?;
            if discount.deactivate() {
                uow.discounts().update_discount(&discount, cancel).await?;
            }
            Ok::<_, ServiceError>(discount)
        }
        .await;
        finish(uow, cancel, result).await
    }

    /// Deletes a discount that was never used.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn delete_discount(
        &self,
        discount_id: DiscountId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = async {
            let discount = load(&uow, discount_id, cancel).await?;
            if !discount.can_be_deleted() {
                return Err(ServiceError::Conflict(format!(
                    "Discount {discount_id} has been used {} times and cannot be deleted",
                    discount.uses()
                )));
            }
            uow.discounts().delete_discount(discount_id, cancel).await?;
            Ok(())
        }
        .await;
        finish(uow, cancel, result).await
    }

    #[tracing::instrument(skip(self, cancel), fields(user_id = %user_id))]
    pub async fn clear_applied_discounts(
        &self,
        user_id: &UserId,
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = async {
            let mut cart = existing_cart(&uow, user_id, cancel).await?;
            let removed = cart.clear_discounts();
            uow.carts().update_cart(&cart, cancel).await?;
            tracing::info!(removed, "Cleared applied discounts");
            Ok::<_, ServiceError>(cart)
        }
        .await;
        finish(uow, cancel, result).await
    }

    /// Applies a coupon code to the user's cart.
    #[tracing::instrument(skip(self, cancel), fields(user_id = %user_id))]
    pub async fn apply_coupon(
        &self,
        user_id: &UserId,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = self
            .apply_coupon_in(&uow, user_id, code, Utc::now(), cancel)
            .await;
        finish(uow, cancel, result).await
    }

    async fn apply_coupon_in(
        &self,
        uow: &UnitOfWork<P>,
        user_id: &UserId,
        code: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ServiceError::validation("Code", "Coupon code is required"));
        }
        let mut cart = non_empty_cart(uow, user_id, cancel).await?;
        let discount = uow
            .discounts()
            .get_discount_by_code(code, cancel)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Coupon {code}")))?;

        let categories = cart_categories(uow, &cart, cancel).await?;
        discount.ensure_eligible(cart.total_amount(), &categories, now)?;
        let used = uow
            .discounts()
            .count_customer_usage(discount.id(), user_id, cancel)
            .await?;
        discount.ensure_customer_allowance(used)?;

        apply(&mut cart, &discount)?;
        uow.carts().update_cart(&cart, cancel).await?;
        tracing::info!(discount_id = %discount.id(), "Coupon applied");
        Ok(cart)
    }

    /// Applies every automatic discount the cart qualifies for.
    ///
    /// Discounts stack; the combined amount never exceeds the cart total.
    #[tracing::instrument(skip(self, cancel), fields(user_id = %user_id))]
    pub async fn apply_automatic_discounts(
        &self,
        user_id: &UserId,
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = async {
            let now = Utc::now();
            let mut cart = non_empty_cart(&uow, user_id, cancel).await?;
            let applicable = self.applicable_in(&uow, user_id, now, cancel).await?;
            for discount in &applicable {
                if cart
                    .applied_discounts()
                    .iter()
                    .any(|applied| applied.discount_id == discount.id())
                {
                    continue;
                }
                apply(&mut cart, discount)?;
            }
            uow.carts().update_cart(&cart, cancel).await?;
            tracing::info!(
                applied = cart.applied_discounts().len(),
                discount_total = %cart.discount_total(),
                "Automatic discounts applied"
            );
            Ok::<_, ServiceError>(cart)
        }
        .await;
        finish(uow, cancel, result).await
    }
}

/// Adds `discount` to the cart, limited to what is left of the cart total.
fn apply(cart: &mut Cart, discount: &Discount) -> Result<()> {
    let amount = discount
        .calculate_amount(cart.total_amount())?
        .try_min(cart.total_with_discount())?;
    cart.apply_discount(AppliedDiscount {
        discount_id: discount.id(),
        code: discount.code().map(str::to_string),
        amount,
    })?;
    Ok(())
}

async fn load<P: Persistence>(
    uow: &UnitOfWork<P>,
    discount_id: DiscountId,
    cancel: &CancellationToken,
) -> Result<Discount> {
    uow.discounts()
        .get_discount_by_id(discount_id, cancel)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("Discount {discount_id}")))
}

/// Categories of the products currently in the cart.
async fn cart_categories<P: Persistence>(
    uow: &UnitOfWork<P>,
    cart: &Cart,
    cancel: &CancellationToken,
) -> Result<BTreeSet<CategoryId>> {
    let mut categories = BTreeSet::new();
    for item in cart.items() {
        if let Some(product) = uow
            .products()
            .get_product_by_id(item.product_id(), cancel)
            .await?
        {
            categories.extend(product.category_ids());
        }
    }
    Ok(categories)
}
