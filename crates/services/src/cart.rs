//! Cart workflows.

use common::{ProductId, UserId};
use domain::{Cart, CartItem, CartRepository, Product, ProductRepository};
use store::{Persistence, UnitOfWork};
use tokio_util::sync::CancellationToken;

use crate::transaction::finish;
use crate::{CheckoutSettings, Result, ServiceError};

/// Maintains one cart per user.
///
/// Every mutation re-reads the product so that prices and stock checks
/// reflect the catalog at the time of the call.
pub struct CartService<P: Persistence> {
    backend: P,
    settings: CheckoutSettings,
}

impl<P: Persistence> CartService<P> {
    pub fn new(backend: P, settings: CheckoutSettings) -> Self {
        Self { backend, settings }
    }

    /// Returns the user's cart, creating an empty one on first access.
    #[tracing::instrument(skip(self, cancel), fields(user_id = %user_id))]
    pub async fn get_cart(&self, user_id: &UserId, cancel: &CancellationToken) -> Result<Cart> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = self.load_or_create(&uow, user_id, cancel).await;
        finish(uow, cancel, result).await
    }

    /// Adds `quantity` units of a product, merging with an existing line.
    #[tracing::instrument(skip(self, cancel), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        user_id: &UserId,
        product_id: ProductId,
        quantity: u32,
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = self
            .add_item_in(&uow, user_id, product_id, quantity, cancel)
            .await;
        finish(uow, cancel, result).await
    }

    async fn add_item_in(
        &self,
        uow: &UnitOfWork<P>,
        user_id: &UserId,
        product_id: ProductId,
        quantity: u32,
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        ensure_positive(quantity)?;
        let product = purchasable_product(uow, product_id, cancel).await?;
        let mut cart = self.load_or_create(uow, user_id, cancel).await?;

        let in_cart = cart.get_item(product_id).map_or(0, CartItem::quantity);
        ensure_stock(&product, in_cart.saturating_add(quantity))?;

        cart.add_item(product_id, quantity, product.price())?;
        uow.carts().update_cart(&cart, cancel).await?;

        tracing::info!(quantity, total = %cart.total_amount(), "Item added to cart");
        Ok(cart)
    }

    /// Sets the quantity of a line already in the cart.
    #[tracing::instrument(skip(self, cancel), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn update_item_quantity(
        &self,
        user_id: &UserId,
        product_id: ProductId,
        quantity: u32,
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = self
            .update_item_quantity_in(&uow, user_id, product_id, quantity, cancel)
            .await;
        finish(uow, cancel, result).await
    }

    async fn update_item_quantity_in(
        &self,
        uow: &UnitOfWork<P>,
        user_id: &UserId,
        product_id: ProductId,
        quantity: u32,
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        ensure_positive(quantity)?;
        let mut cart = existing_cart(uow, user_id, cancel).await?;
        if cart.get_item(product_id).is_none() {
            return Err(ServiceError::not_found(format!(
                "Product {product_id} is not in the cart"
            )));
        }
        let product = purchasable_product(uow, product_id, cancel).await?;
        ensure_stock(&product, quantity)?;

        cart.update_item_quantity(product_id, quantity)?;
        uow.carts().update_cart(&cart, cancel).await?;
        Ok(cart)
    }

    #[tracing::instrument(skip(self, cancel), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn remove_item(
        &self,
        user_id: &UserId,
        product_id: ProductId,
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = async {
            let mut cart = existing_cart(&uow, user_id, cancel).await?;
            cart.remove_item(product_id)?;
            uow.carts().update_cart(&cart, cancel).await?;
            Ok::<_, ServiceError>(cart)
        }
        .await;
        finish(uow, cancel, result).await
    }

    /// Empties the cart, dropping its lines and applied discounts.
    #[tracing::instrument(skip(self, cancel), fields(user_id = %user_id))]
    pub async fn clear_cart(&self, user_id: &UserId, cancel: &CancellationToken) -> Result<Cart> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = async {
            let mut cart = self.load_or_create(&uow, user_id, cancel).await?;
            cart.clear();
            uow.carts().update_cart(&cart, cancel).await?;
            Ok::<_, ServiceError>(cart)
        }
        .await;
        finish(uow, cancel, result).await
    }

    pub(crate) async fn load_or_create(
        &self,
        uow: &UnitOfWork<P>,
        user_id: &UserId,
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        if let Some(cart) = uow.carts().get_cart_by_user(user_id, cancel).await? {
            return Ok(cart);
        }
        let cart = Cart::create(user_id.clone(), self.settings.default_currency);
        uow.carts().create_cart(&cart, cancel).await?;
        tracing::info!(cart_id = %cart.id(), "Created cart");
        Ok(cart)
    }
}

/// Loads the user's cart without creating one.
pub(crate) async fn existing_cart<P: Persistence>(
    uow: &UnitOfWork<P>,
    user_id: &UserId,
    cancel: &CancellationToken,
) -> Result<Cart> {
    uow.carts()
        .get_cart_by_user(user_id, cancel)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("Cart for user {user_id}")))
}

/// Loads the user's cart and requires it to hold at least one line.
pub(crate) async fn non_empty_cart<P: Persistence>(
    uow: &UnitOfWork<P>,
    user_id: &UserId,
    cancel: &CancellationToken,
) -> Result<Cart> {
    let cart = existing_cart(uow, user_id, cancel).await?;
    if cart.is_empty() {
        return Err(ServiceError::validation("Cart", "Cart is empty"));
    }
    Ok(cart)
}

async fn purchasable_product<P: Persistence>(
    uow: &UnitOfWork<P>,
    product_id: ProductId,
    cancel: &CancellationToken,
) -> Result<Product> {
    let product = uow
        .products()
        .get_product_by_id(product_id, cancel)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("Product {product_id}")))?;
    if !product.is_purchasable() {
        return Err(ServiceError::Conflict(format!(
            "Product {} is not available ({})",
            product.name(),
            product.status()
        )));
    }
    Ok(product)
}

fn ensure_positive(quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(ServiceError::validation(
            "Quantity",
            "Quantity must be greater than 0",
        ));
    }
    Ok(())
}

fn ensure_stock(product: &Product, quantity: u32) -> Result<()> {
    if !product.has_stock(quantity) {
        return Err(ServiceError::Conflict(format!(
            "Insufficient stock for {}: requested {quantity}, available {}",
            product.name(),
            product.stock()
        )));
    }
    Ok(())
}
