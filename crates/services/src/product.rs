//! Catalog maintenance.

use common::{Money, ProductId};
use domain::{NewProduct, Page, PageRequest, Product, ProductRepository};
use serde::{Deserialize, Serialize};
use store::{Persistence, UnitOfWork};
use tokio_util::sync::CancellationToken;

use crate::transaction::finish;
use crate::{Result, ServiceError};

/// Requested change of a product's sale status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusChangeAction {
    Activate,
    Deactivate,
    Discontinue,
}

pub struct ProductService<P: Persistence> {
    backend: P,
}

impl<P: Persistence> ProductService<P> {
    pub fn new(backend: P) -> Self {
        Self { backend }
    }

    #[tracing::instrument(skip(self, new, cancel), fields(name = %new.name))]
    pub async fn create_product(
        &self,
        new: NewProduct,
        cancel: &CancellationToken,
    ) -> Result<Product> {
        let product = Product::create(new)?;
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = uow
            .products()
            .create_product(&product, cancel)
            .await
            .map_err(ServiceError::from);
        finish(uow, cancel, result).await?;

        tracing::info!(product_id = %product.id(), "Product created");
        Ok(product)
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn get_product(
        &self,
        product_id: ProductId,
        cancel: &CancellationToken,
    ) -> Result<Product> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = load(&uow, product_id, cancel).await;
        finish(uow, cancel, result).await
    }

    /// Lists products ordered by name.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn list_products(
        &self,
        request: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<Product>> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = uow
            .products()
            .list_products(request, cancel)
            .await
            .map_err(ServiceError::from);
        finish(uow, cancel, result).await
    }

    #[tracing::instrument(skip(self, cancel), fields(price = %price))]
    pub async fn update_price(
        &self,
        product_id: ProductId,
        price: Money,
        cancel: &CancellationToken,
    ) -> Result<Product> {
        self.modify(product_id, cancel, |product| {
            product.update_price(price).map_err(ServiceError::from)
        })
        .await
    }

    /// Adds `delta` units to stock, or removes them when negative.
    ///
    /// Removing more units than are in stock is a conflict; stock never
    /// goes below zero.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn adjust_stock(
        &self,
        product_id: ProductId,
        delta: i64,
        cancel: &CancellationToken,
    ) -> Result<Product> {
        let units = u32::try_from(delta.unsigned_abs())
            .map_err(|_| ServiceError::validation("Delta", "Stock adjustment is too large"))?;

        self.modify(product_id, cancel, |product| {
            if delta >= 0 {
                product.increment_stock(units);
                return Ok(());
            }
            if product.decrement_stock(units) {
                Ok(())
            } else {
                Err(ServiceError::Conflict(format!(
                    "Cannot remove {units} units from {}: only {} in stock",
                    product.name(),
                    product.stock()
                )))
            }
        })
        .await
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn change_status(
        &self,
        product_id: ProductId,
        action: StatusChangeAction,
        cancel: &CancellationToken,
    ) -> Result<Product> {
        self.modify(product_id, cancel, |product| {
            match action {
                StatusChangeAction::Activate => product.activate()?,
                StatusChangeAction::Deactivate => product.deactivate()?,
                StatusChangeAction::Discontinue => product.discontinue(),
            }
            Ok(())
        })
        .await
    }

    async fn modify<F>(
        &self,
        product_id: ProductId,
        cancel: &CancellationToken,
        change: F,
    ) -> Result<Product>
    where
        F: FnOnce(&mut Product) -> Result<()>,
    {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = self.modify_in(&uow, product_id, cancel, change).await;
        finish(uow, cancel, result).await
    }

    async fn modify_in<F>(
        &self,
        uow: &UnitOfWork<P>,
        product_id: ProductId,
        cancel: &CancellationToken,
        change: F,
    ) -> Result<Product>
    where
        F: FnOnce(&mut Product) -> Result<()>,
    {
        let mut product = load(uow, product_id, cancel).await?;
        change(&mut product)?;
        uow.products().update_product(&product, cancel).await?;
        tracing::info!(
            stock = product.stock(),
            status = %product.status(),
            "Product updated"
        );
        Ok(product)
    }
}

async fn load<P: Persistence>(
    uow: &UnitOfWork<P>,
    product_id: ProductId,
    cancel: &CancellationToken,
) -> Result<Product> {
    uow.products()
        .get_product_by_id(product_id, cancel)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("Product {product_id}")))
}
